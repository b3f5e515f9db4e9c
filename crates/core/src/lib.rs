pub mod approval;
pub mod channels;
pub mod criteria;
pub mod derivation;
pub mod disbursement;
pub mod error;
pub mod event_types;
pub mod extraction;
pub mod grades;
pub mod messages;
pub mod patch;
pub mod renewal_cycle;
pub mod responsibility;
pub mod roles;
pub mod types;
