//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods taking
//! `&PgPool` first. Multi-table writes open their own transaction.

pub mod approval_repo;
pub mod disbursement_repo;
pub mod event_repo;
pub mod extraction_job_repo;
pub mod notification_repo;
pub mod reference_repo;
pub mod renewal_batch_repo;
pub mod renewal_repo;
pub mod session_repo;
pub mod user_repo;

pub use approval_repo::ApprovalRepo;
pub use disbursement_repo::DisbursementRepo;
pub use event_repo::EventRepo;
pub use extraction_job_repo::ExtractionJobRepo;
pub use notification_repo::NotificationRepo;
pub use reference_repo::ReferenceRepo;
pub use renewal_batch_repo::RenewalBatchRepo;
pub use renewal_repo::RenewalRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
