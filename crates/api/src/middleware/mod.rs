//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the caller, from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.
//! - [`rbac::RequireOfficer`] -- requires `scholarship_officer` or `admin`.

pub mod auth;
pub mod rbac;
