//! Shared fixtures for repository integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use sqlx::PgPool;
use scholarship_core::patch::ValidationPatch;
use scholarship_core::renewal_cycle::Term;
use scholarship_core::types::DbId;
use scholarship_db::models::renewal::{BatchActor, BatchRow};
use scholarship_db::repositories::RenewalRepo;

pub const SCHOOL_YEAR: &str = "2025-2026";
pub const SEMESTER: &str = "1st Semester";

/// Insert a user with the given role, returning its ID.
pub async fn seed_user(pool: &PgPool, username: &str, role: &str) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, role_id)
         SELECT $1, $1 || '@example.edu', 'not-a-real-hash', id FROM roles WHERE name = $2
         RETURNING id",
    )
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn branch_id(pool: &PgPool, name: &str) -> DbId {
    sqlx::query_scalar("SELECT id FROM branches WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Insert an active scholar, returning its ID.
pub async fn seed_scholar(pool: &PgPool, student_number: &str, year_level: i16, branch: &str) -> DbId {
    let branch_id = branch_id(pool, branch).await;
    sqlx::query_scalar(
        "INSERT INTO scholars (student_number, first_name, last_name, year_level, branch_id)
         VALUES ($1, 'Test', $1, $2, $3)
         RETURNING id",
    )
    .bind(student_number)
    .bind(year_level)
    .bind(branch_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Initialize the default cycle and return the created renewal IDs.
pub async fn init_cycle(pool: &PgPool, by: DbId) -> Vec<DbId> {
    let term = Term::parse(SCHOOL_YEAR, SEMESTER).unwrap();
    RenewalRepo::initialize_cycle(pool, term, None, by)
        .await
        .unwrap()
        .renewal_ids
}

pub fn patch(fields: Value) -> ValidationPatch {
    ValidationPatch::from_json(fields.as_object().unwrap()).unwrap()
}

pub fn row(renewal_id: DbId, validator_id: Option<DbId>, fields: Value) -> BatchRow {
    BatchRow {
        renewal_id,
        validator_id,
        patch: patch(fields),
    }
}

pub fn actor(user_id: DbId, role: &str) -> BatchActor<'_> {
    BatchActor {
        user_id,
        role,
        branch_id: None,
    }
}

pub fn branch_actor(user_id: DbId, role: &str, branch_id: DbId) -> BatchActor<'_> {
    BatchActor {
        user_id,
        role,
        branch_id: Some(branch_id),
    }
}

/// Every criterion Passed.
pub fn all_passed() -> Value {
    json!({
        "gpa_validation": "Passed",
        "no_failing_grade_validation": "Passed",
        "no_other_scholarship_validation": "Passed",
        "good_moral_validation": "Passed",
        "no_derogatory_record_validation": "Passed",
        "full_load_validation": "Passed",
        "withdrawal_change_validation": "Passed",
        "enrollment_validation": "Passed",
    })
}
