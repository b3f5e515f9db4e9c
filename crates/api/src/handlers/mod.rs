//! Request handlers, one submodule per resource.
//!
//! Handlers delegate to the repositories in `scholarship_db`, publish
//! domain events on the bus, and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod admin;
pub mod approval;
pub mod auth;
pub mod disbursement;
pub mod document;
pub mod maintenance;
pub mod notification;
pub mod renewal;
