//! Branches, roles, and validator responsibilities.

use sqlx::PgPool;
use scholarship_core::types::DbId;

use crate::models::reference::{Branch, Role, RoleResponsibilities};

/// Read access to reference tables plus responsibility maintenance.
pub struct ReferenceRepo;

impl ReferenceRepo {
    pub async fn list_branches(pool: &PgPool) -> Result<Vec<Branch>, sqlx::Error> {
        sqlx::query_as::<_, Branch>(
            "SELECT id, name, created_at, updated_at FROM branches ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY id",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_role_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Every role with its responsibility fields (empty for roles with none).
    pub async fn list_responsibilities(
        pool: &PgPool,
    ) -> Result<Vec<RoleResponsibilities>, sqlx::Error> {
        sqlx::query_as::<_, RoleResponsibilities>(
            "SELECT r.id AS role_id, r.name AS role_name,
                    COALESCE(ARRAY_AGG(vr.field_name ORDER BY vr.field_name)
                             FILTER (WHERE vr.field_name IS NOT NULL), '{}') AS fields
             FROM roles r
             LEFT JOIN validator_responsibilities vr ON vr.role_id = r.id
             GROUP BY r.id, r.name
             ORDER BY r.id",
        )
        .fetch_all(pool)
        .await
    }

    /// Replace a role's responsibility set in one transaction.
    pub async fn replace_responsibilities(
        pool: &PgPool,
        role_id: DbId,
        fields: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM validator_responsibilities WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO validator_responsibilities (role_id, field_name)
             SELECT $1, f FROM UNNEST($2::TEXT[]) AS f
             ON CONFLICT ON CONSTRAINT uq_validator_responsibilities_role_field DO NOTHING",
        )
        .bind(role_id)
        .bind(fields)
        .execute(&mut *tx)
        .await?;

        let stored: Vec<String> = sqlx::query_scalar(
            "SELECT field_name FROM validator_responsibilities WHERE role_id = $1 ORDER BY field_name",
        )
        .bind(role_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }
}
