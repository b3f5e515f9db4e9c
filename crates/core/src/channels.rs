//! Notification channel name constants.
//!
//! These must match the values stored in `notifications.channel`.

/// Stored for the notification bell and pushed over WebSocket.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Delivered via SMTP when email is configured.
pub const CHANNEL_EMAIL: &str = "email";
