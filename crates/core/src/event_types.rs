//! Platform event type names published on the event bus and stored in
//! the `events` table.

pub const RENEWAL_CYCLE_INITIALIZED: &str = "renewal.cycle_initialized";
pub const RENEWAL_UPDATED: &str = "renewal.updated";
pub const RENEWAL_DELISTED: &str = "renewal.delisted";

pub const EXTRACTION_COMPLETED: &str = "extraction.completed";
pub const EXTRACTION_FAILED: &str = "extraction.failed";

pub const DISBURSEMENT_SCHEDULED: &str = "disbursement.scheduled";
pub const DISBURSEMENT_RELEASED: &str = "disbursement.released";
pub const DISBURSEMENT_CANCELLED: &str = "disbursement.cancelled";

pub const APPROVAL_REQUESTED: &str = "approval.requested";
pub const APPROVAL_APPROVED: &str = "approval.approved";
pub const APPROVAL_REJECTED: &str = "approval.rejected";

/// Events that produce a stored notification for their target user.
pub const NOTIFYING_EVENTS: &[&str] = &[
    RENEWAL_DELISTED,
    EXTRACTION_COMPLETED,
    EXTRACTION_FAILED,
    DISBURSEMENT_RELEASED,
    APPROVAL_REQUESTED,
    APPROVAL_APPROVED,
    APPROVAL_REJECTED,
];

/// Events also worth an email when SMTP is configured.
pub const EMAIL_EVENTS: &[&str] = &[RENEWAL_DELISTED, APPROVAL_REQUESTED, DISBURSEMENT_RELEASED];

/// Short human title for a notification.
pub fn title_for(event_type: &str) -> &'static str {
    match event_type {
        RENEWAL_CYCLE_INITIALIZED => "Renewal cycle initialized",
        RENEWAL_UPDATED => "Renewal updated",
        RENEWAL_DELISTED => "Scholar delisted",
        EXTRACTION_COMPLETED => "Document extraction completed",
        EXTRACTION_FAILED => "Document extraction failed",
        DISBURSEMENT_SCHEDULED => "Disbursement scheduled",
        DISBURSEMENT_RELEASED => "Disbursement released",
        DISBURSEMENT_CANCELLED => "Disbursement cancelled",
        APPROVAL_REQUESTED => "Approval requested",
        APPROVAL_APPROVED => "Request approved",
        APPROVAL_REJECTED => "Request rejected",
        _ => "Notification",
    }
}
