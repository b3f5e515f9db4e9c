//! HTTP-level integration tests for renewal cycles and batch validation.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_user, get_auth, post_json_auth, put_json_auth, seed_scholar, SCHOOL_YEAR,
    SEMESTER,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use scholarship_core::event_types::{RENEWAL_DELISTED, RENEWAL_UPDATED};

/// Initialize the default cycle through the API and return the created
/// renewal IDs.
async fn initialize(app: &common::TestApp, token: &str) -> Vec<i64> {
    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/initialize",
        token,
        json!({ "school_year": SCHOOL_YEAR, "semester": SEMESTER }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["renewal_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_i64().unwrap())
        .collect()
}

async fn validator_id(app: &common::TestApp, token: &str, renewal_id: i64, role: &str) -> i64 {
    let response = get_auth(
        app.router(),
        &format!("/api/v1/renewals/{renewal_id}/validators"),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["role_name"] == role)
        .and_then(|v| v["validator_id"].as_i64())
        .expect("validator for role")
}

async fn batch(app: &common::TestApp, token: &str, updates: Value) -> (StatusCode, Value) {
    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/batch-update",
        token,
        json!({ "updates": updates }),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Cycle initialization
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn initialize_is_idempotent_per_term(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    seed_scholar(&pool, "2022-0002", "North").await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&officer);

    let created = initialize(&app, &token).await;
    assert_eq!(created.len(), 2);

    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/initialize",
        &token,
        json!({ "school_year": SCHOOL_YEAR, "semester": SEMESTER }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["created"], 0);
    assert_eq!(json["data"]["skipped_existing"], 2);

    let response = get_auth(app.router(), "/api/v1/renewals/cycles", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn initialize_rejects_bad_term_and_wrong_role(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let registrar = create_user(&pool, "registrar", "registrar", None).await;
    let app = common::build_test_app(pool).await;

    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/initialize",
        &app.token_for(&officer),
        json!({ "school_year": "2025-2027", "semester": SEMESTER }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/initialize",
        &app.token_for(&registrar),
        json!({ "school_year": SCHOOL_YEAR, "semester": SEMESTER }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Batch update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn registrar_updates_only_its_own_fields(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let registrar = create_user(&pool, "registrar", "registrar", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    let app = common::build_test_app(pool).await;
    let renewals = initialize(&app, &app.token_for(&officer)).await;
    let token = app.token_for(&registrar);
    let vid = validator_id(&app, &token, renewals[0], "registrar").await;

    let (status, json) = batch(
        &app,
        &token,
        json!([{
            "renewal_id": renewals[0],
            "validator_id": vid,
            "changed_fields": {
                "gpa": 1.75,
                "gpa_validation": "Passed",
                "good_moral_validation": "Passed",
            },
        }]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["updated_count"], 1);
    assert_eq!(json["data"]["dropped_fields"][0]["fields"], json!(["good_moral_validation"]));

    let response = get_auth(
        app.router(),
        &format!("/api/v1/renewals/{}", renewals[0]),
        &token,
    )
    .await;
    let detail = body_json(response).await;
    assert_eq!(detail["data"]["gpa"], 1.75);
    assert_eq!(detail["data"]["gpa_validation"], "Passed");
    assert_eq!(detail["data"]["good_moral_validation"], "Not Started");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn validator_roles_need_a_validator_id(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let hr = create_user(&pool, "hr", "hr", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    let app = common::build_test_app(pool).await;
    let renewals = initialize(&app, &app.token_for(&officer)).await;

    let (status, json) = batch(
        &app,
        &app.token_for(&hr),
        json!([{
            "renewal_id": renewals[0],
            "changed_fields": { "no_other_scholarship_validation": "Passed" },
        }]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["updated_count"], 0);
    assert_eq!(json["data"]["skipped"][0]["renewal_id"], renewals[0]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_criterion_delists_and_publishes(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&officer);
    let renewals = initialize(&app, &token).await;
    let mut events = app.state.event_bus.subscribe();

    let (status, json) = batch(
        &app,
        &token,
        json!([{
            "renewal_id": renewals[0],
            "changed_fields": { "good_moral_validation": "Failed" },
        }]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["newly_delisted"], json!([renewals[0]]));

    let response = get_auth(
        app.router(),
        &format!("/api/v1/renewals/{}", renewals[0]),
        &token,
    )
    .await;
    let detail = body_json(response).await;
    assert_eq!(detail["data"]["scholarship_status"], "Delisted");
    assert_eq!(detail["data"]["scholar_status"], "Delisted");

    let first = events.recv().await.unwrap();
    assert_eq!(first.event_type, RENEWAL_UPDATED);
    let second = events.recv().await.unwrap();
    assert_eq!(second.event_type, RENEWAL_DELISTED);
    assert_eq!(second.source_id, Some(renewals[0]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_rejects_unknown_fields_and_empty_bodies(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&officer);
    let renewals = initialize(&app, &token).await;

    let (status, json) = batch(
        &app,
        &token,
        json!([{
            "renewal_id": renewals[0],
            "changed_fields": { "gpa_score": 1.5 },
        }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with(&format!("Renewal {}", renewals[0])));

    let (status, _) = batch(&app, &token, json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn summary_requires_a_term(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    seed_scholar(&pool, "2022-0002", "Main").await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&officer);
    initialize(&app, &token).await;

    let response = get_auth(app.router(), "/api/v1/renewals/summary", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get_auth(
        app.router(),
        "/api/v1/renewals/summary?school_year=2025-2026&semester=1st%20Semester",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["not_started"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn assigned_list_is_scoped_to_the_callers_branch(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let north = common::branch_id(&pool, "North").await;
    let registrar = create_user(&pool, "north_registrar", "registrar", Some(north)).await;
    seed_scholar(&pool, "2022-0001", "Main").await;
    seed_scholar(&pool, "2022-0002", "North").await;
    let app = common::build_test_app(pool).await;
    initialize(&app, &app.token_for(&officer)).await;

    let response = get_auth(
        app.router(),
        "/api/v1/renewals/assigned",
        &app.token_for(&registrar),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["student_number"], "2022-0002");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_renewal_is_404(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let app = common::build_test_app(pool).await;

    let response = get_auth(app.router(), "/api/v1/renewals/9999", &app.token_for(&officer)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_replaces_role_responsibilities(pool: PgPool) {
    let admin = create_user(&pool, "admin", "admin", None).await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&admin);

    let response = put_json_auth(
        app.router(),
        "/api/v1/maintenance/responsibilities/hr",
        &token,
        json!({ "fields": ["no_other_scholarship_validation", "renewal_date"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["role"], "hr");

    let response = put_json_auth(
        app.router(),
        "/api/v1/maintenance/responsibilities/hr",
        &token,
        json!({ "fields": ["shoe_size"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = put_json_auth(
        app.router(),
        "/api/v1/maintenance/responsibilities/janitor",
        &token,
        json!({ "fields": ["gpa"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
