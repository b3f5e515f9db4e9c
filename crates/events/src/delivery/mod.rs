//! Outbound delivery channels used by the notification router.

pub mod email;
