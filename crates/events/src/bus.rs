//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared as `Arc<EventBus>` across handlers and background
//! tasks. Dropping the last handle closes the channel, which is how the
//! persistence and routing loops learn to shut down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use scholarship_core::types::DbId;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Something that happened in the system.
///
/// Built with [`PlatformEvent::new`] plus the `with_*` builders. Recipients
/// are either named directly ([`with_targets`](Self::with_targets)) or by
/// role ([`with_audience`](Self::with_audience)); the notification router
/// resolves both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"renewal.delisted"`.
    pub event_type: String,

    /// Source entity kind (`"renewal"`, `"extraction_job"`, ...).
    pub source_entity: Option<String>,

    pub source_id: Option<DbId>,

    pub actor_user_id: Option<DbId>,

    /// Users to notify directly.
    pub target_user_ids: Vec<DbId>,

    /// Role whose active users should be notified.
    pub audience_role: Option<String>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity: None,
            source_id: None,
            actor_user_id: None,
            target_user_ids: Vec::new(),
            audience_role: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity: impl Into<String>, id: DbId) -> Self {
        self.source_entity = Some(entity.into());
        self.source_id = Some(id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Add users to notify. Duplicates are ignored.
    pub fn with_targets(mut self, user_ids: impl IntoIterator<Item = DbId>) -> Self {
        for id in user_ids {
            if !self.target_user_ids.contains(&id) {
                self.target_user_ids.push(id);
            }
        }
        self
    }

    pub fn with_audience(mut self, role: impl Into<String>) -> Self {
        self.audience_role = Some(role.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus. Every subscriber sees every event.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when nobody is
    /// listening.
    pub fn publish(&self, event: PlatformEvent) {
        tracing::debug!(event_type = %event.event_type, source_id = ?event.source_id, "Event published");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
