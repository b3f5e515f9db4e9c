//! WebSocket message type names pushed to connected clients.
//!
//! Every message is a JSON object with a `type` field set to one of these.

/// Renewals changed; clients should refetch. Carries no diff.
pub const WS_RENEWAL_UPDATED: &str = "renewal_updated";

pub const WS_JOB_PROGRESS: &str = "job_progress";
pub const WS_JOB_COMPLETED: &str = "job_completed";
pub const WS_JOB_FAILED: &str = "job_failed";

pub const WS_NOTIFICATION: &str = "notification";

pub const WS_PING: &str = "ping";
pub const WS_PONG: &str = "pong";
