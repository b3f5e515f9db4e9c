//! Branch, role, and validator-responsibility rows.

use serde::Serialize;
use sqlx::FromRow;
use scholarship_core::types::{DbId, Timestamp};

/// A row from the `branches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Branch {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `roles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// All responsibility fields held by one role.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleResponsibilities {
    pub role_id: DbId,
    pub role_name: String,
    pub fields: Vec<String>,
}
