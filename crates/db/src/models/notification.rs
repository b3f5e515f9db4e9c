//! Stored notification model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scholarship_core::types::{DbId, Timestamp};

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub event_id: Option<DbId>,
    pub user_id: DbId,
    pub event_type: String,
    pub title: String,
    pub body: Option<String>,
    pub payload: serde_json::Value,
    pub channel: String,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for storing a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub event_id: Option<DbId>,
    pub user_id: DbId,
    pub event_type: String,
    pub title: String,
    pub body: Option<String>,
    pub payload: serde_json::Value,
    pub channel: String,
}

/// Query parameters for `GET /api/v1/notifications`.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
