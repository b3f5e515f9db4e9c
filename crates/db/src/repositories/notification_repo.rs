//! Repository for the `notifications` table.

use sqlx::PgPool;
use scholarship_core::channels::CHANNEL_IN_APP;
use scholarship_core::types::DbId;

use crate::models::notification::{CreateNotification, Notification};

const COLUMNS: &str = "\
    id, event_id, user_id, event_type, title, body, payload, channel, \
    is_read, read_at, created_at";

/// Stored per-user notifications.
///
/// Reads and unread counts cover the in-app channel only; email rows are a
/// delivery record.
pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications \
                (event_id, user_id, event_type, title, body, payload, channel) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(input.event_id)
            .bind(input.user_id)
            .bind(&input.event_type)
            .bind(&input.title)
            .bind(&input.body)
            .bind(&input.payload)
            .bind(&input.channel)
            .fetch_one(pool)
            .await
    }

    /// List a user's notifications, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let filter = if unread_only { "AND is_read = false" } else { "" };
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND channel = $4 {filter} \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .bind(CHANNEL_IN_APP)
            .fetch_all(pool)
            .await
    }

    /// Returns `false` if not found for this user or already read.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_read = false",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns how many were marked.
    pub async fn mark_all_read(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE user_id = $1 AND channel = $2 AND is_read = false",
        )
        .bind(user_id)
        .bind(CHANNEL_IN_APP)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 AND channel = $2 AND is_read = false",
        )
        .bind(user_id)
        .bind(CHANNEL_IN_APP)
        .fetch_one(pool)
        .await
    }
}
