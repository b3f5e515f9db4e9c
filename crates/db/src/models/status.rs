//! Status enums mapping to SMALLSERIAL lookup tables.
//!
//! Each variant's discriminant matches the seed order (1-based) in the
//! corresponding `*_statuses` table, and its name matches the seeded `name`.

use serde::Serialize;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Seeded `name` of this status.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Resolve a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( v if v == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Resolve a seeded status name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $label => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Extraction job lifecycle.
    ExtractionJobStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        TimedOut = 5 => "timed_out",
    }
}

impl ExtractionJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Allowed moves. Terminal states never change; retries create a new job.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ExtractionJobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Pending)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, TimedOut)
        )
    }

    /// Whether a manual retry may be started from this state.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

define_status_enum! {
    /// Approval request status.
    ApprovalStatus {
        Pending = 1 => "pending",
        Approved = 2 => "approved",
        Rejected = 3 => "rejected",
    }
}

define_status_enum! {
    /// Disbursement schedule lifecycle.
    DisbursementStatus {
        PendingApproval = 1 => "pending_approval",
        Approved = 2 => "approved",
        Released = 3 => "released",
        Cancelled = 4 => "cancelled",
    }
}

impl DisbursementStatus {
    pub fn can_release(self) -> bool {
        self == Self::Approved
    }

    pub fn can_cancel(self) -> bool {
        matches!(self, Self::PendingApproval | Self::Approved)
    }
}
