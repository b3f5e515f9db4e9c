//! Event bus and notification delivery for the scholarship backend.
//!
//! - [`EventBus`]: in-process publish/subscribe hub over
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope published by handlers and
//!   background tasks.
//! - [`EventPersistence`]: background service writing every event to the
//!   `events` audit table.
//! - [`delivery`]: outbound channels (SMTP email).

pub mod bus;
pub mod delivery;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use persistence::EventPersistence;
