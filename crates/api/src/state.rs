use std::sync::Arc;

use scholarship_storage::ObjectStore;
use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: scholarship_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Centralized event bus for publishing domain events.
    pub event_bus: Arc<scholarship_events::EventBus>,
    /// Where uploaded originals are kept.
    pub storage: Arc<dyn ObjectStore>,
    /// Wakes the extraction runner when a job is enqueued.
    pub extraction_wakeup: Arc<Notify>,
}
