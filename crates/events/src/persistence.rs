//! Durable event log.
//!
//! [`EventPersistence`] subscribes to the bus and writes every event to the
//! `events` table. It exits when the bus is dropped.

use tokio::sync::broadcast;
use scholarship_core::types::DbId;
use scholarship_db::repositories::EventRepo;
use scholarship_db::DbPool;

use crate::bus::PlatformEvent;

/// Background service that appends events to the audit log.
pub struct EventPersistence;

impl EventPersistence {
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event persistence lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    pub async fn persist(pool: &DbPool, event: &PlatformEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &event.event_type,
            event.source_entity.as_deref(),
            event.source_id,
            event.actor_user_id,
            &event.payload,
        )
        .await
    }
}
