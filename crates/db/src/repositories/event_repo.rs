//! Repository for the `events` audit log.

use sqlx::PgPool;
use scholarship_core::types::DbId;

use crate::models::event::Event;

const COLUMNS: &str =
    "id, event_type, source_entity, source_id, actor_user_id, payload, created_at";

/// Append-only event log.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event, returning its ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        source_entity: Option<&str>,
        source_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events (event_type, source_entity, source_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(source_entity)
        .bind(source_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Recent events, newest first, optionally for one source entity.
    pub async fn list_recent(
        pool: &PgPool,
        source: Option<(&str, DbId)>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let (entity, id) = source.unzip();
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE ($1::TEXT IS NULL OR (source_entity = $1 AND source_id = $2)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(entity)
            .bind(id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
