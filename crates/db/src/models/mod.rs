//! Row structs and DTOs.
//!
//! Each submodule holds the `FromRow` row types for its tables plus the
//! create/update DTOs its repository accepts.

pub mod approval;
pub mod disbursement;
pub mod event;
pub mod extraction_job;
pub mod notification;
pub mod reference;
pub mod renewal;
pub mod session;
pub mod status;
pub mod user;
