//! Notification routing.
//!
//! The [`NotificationRouter`] subscribes to the event bus, stores a
//! notification per recipient, pushes it over WebSocket, and sends email for
//! the events that warrant it.

pub mod router;

pub use router::NotificationRouter;
