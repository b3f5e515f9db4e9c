//! HTTP-level integration tests for disbursement schedules and the approval
//! workflow that gates their release.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    body_json, create_user, get_auth, post_auth, post_json_auth, seed_scholar, SCHOOL_YEAR,
    SEMESTER,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use scholarship_core::event_types::{APPROVAL_APPROVED, APPROVAL_REQUESTED, DISBURSEMENT_SCHEDULED};
use scholarship_db::models::user::User;

const ALL_PASSED: &[&str] = &[
    "gpa_validation",
    "no_failing_grade_validation",
    "no_other_scholarship_validation",
    "good_moral_validation",
    "no_derogatory_record_validation",
    "full_load_validation",
    "withdrawal_change_validation",
    "enrollment_validation",
];

/// One Passed scholar and one left Not Started.
async fn seed_cycle(app: &common::TestApp, officer: &User) {
    seed_scholar(&app.state.pool, "2021-0001", "Main").await;
    seed_scholar(&app.state.pool, "2021-0002", "Main").await;
    let token = app.token_for(officer);

    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/initialize",
        &token,
        json!({ "school_year": SCHOOL_YEAR, "semester": SEMESTER }),
    )
    .await;
    let json = body_json(response).await;
    let first = json["data"]["renewal_ids"][0].clone();

    let fields: serde_json::Map<String, Value> = ALL_PASSED
        .iter()
        .map(|f| (f.to_string(), json!("Passed")))
        .collect();
    let response = post_json_auth(
        app.router(),
        "/api/v1/renewals/batch-update",
        &token,
        json!({ "updates": [{ "renewal_id": first, "changed_fields": fields }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn schedule_body() -> Value {
    json!({
        "title": "First semester stipend",
        "school_year": SCHOOL_YEAR,
        "semester": SEMESTER,
        "amount": 5000.00,
        "release_date": (Utc::now().date_naive() + Duration::days(30)).to_string(),
    })
}

async fn create_schedule(app: &common::TestApp, officer: &User) -> Value {
    let response = post_json_auth(
        app.router(),
        "/api/v1/disbursements",
        &app.token_for(officer),
        schedule_body(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn schedule_covers_passed_scholars_and_awaits_approval(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let app = common::build_test_app(pool).await;
    seed_cycle(&app, &officer).await;
    let mut events = app.state.event_bus.subscribe();

    let schedule = create_schedule(&app, &officer).await;

    assert_eq!(schedule["status"], "pending_approval");
    assert_eq!(schedule["entry_count"], 1);
    assert_eq!(schedule["amount_cents"], 500_000);
    assert_eq!(schedule["total_cents"], 500_000);
    assert_eq!(schedule["entries"][0]["student_number"], "2021-0001");
    assert!(schedule["approval_request_id"].is_i64());

    let scheduled = events.recv().await.unwrap();
    assert_eq!(scheduled.event_type, DISBURSEMENT_SCHEDULED);
    let requested = events.recv().await.unwrap();
    assert_eq!(requested.event_type, APPROVAL_REQUESTED);
    assert_eq!(requested.audience_role.as_deref(), Some("scholarship_officer"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn schedule_validates_amount_date_and_role(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let hr = create_user(&pool, "hr", "hr", None).await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&officer);

    let mut body = schedule_body();
    body["amount"] = json!(0);
    let response = post_json_auth(app.router(), "/api/v1/disbursements", &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = schedule_body();
    body["release_date"] = json!("2001-01-01");
    let response = post_json_auth(app.router(), "/api/v1/disbursements", &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        app.router(),
        "/api/v1/disbursements",
        &app.token_for(&hr),
        schedule_body(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Approval and release
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn two_step_approval_then_release(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let admin = create_user(&pool, "admin", "admin", None).await;
    let app = common::build_test_app(pool).await;
    seed_cycle(&app, &officer).await;
    let schedule = create_schedule(&app, &officer).await;
    let schedule_id = schedule["id"].as_i64().unwrap();
    let request_id = schedule["approval_request_id"].as_i64().unwrap();
    let officer_token = app.token_for(&officer);
    let admin_token = app.token_for(&admin);

    // Not releasable yet.
    let release_uri = format!("/api/v1/disbursements/{schedule_id}/release");
    let response = post_auth(app.router(), &release_uri, &officer_token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The officer's queue holds the first step.
    let response = get_auth(app.router(), "/api/v1/approvals?mine=true", &officer_token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["id"], request_id);

    let approve_uri = format!("/api/v1/approvals/{request_id}/approve");
    let response = post_json_auth(
        app.router(),
        &approve_uri,
        &officer_token,
        json!({ "comment": "Amounts checked" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["current_step"], 2);
    assert_eq!(json["data"]["actions"][0]["comment"], "Amounts checked");

    // Step two belongs to the admin.
    let response = post_auth(app.router(), &approve_uri, &officer_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut events = app.state.event_bus.subscribe();
    let response = post_auth(app.router(), &approve_uri, &admin_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "approved");

    let approved = events.recv().await.unwrap();
    assert_eq!(approved.event_type, APPROVAL_APPROVED);
    assert_eq!(approved.target_user_ids, vec![officer.id]);

    // Decided requests stay decided.
    let response = post_auth(app.router(), &approve_uri, &admin_token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_auth(app.router(), &release_uri, &officer_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "released");
    assert!(json["data"]["released_at"].is_string());

    let response = post_auth(app.router(), &release_uri, &officer_token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejection_cancels_the_schedule(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let app = common::build_test_app(pool).await;
    seed_cycle(&app, &officer).await;
    let schedule = create_schedule(&app, &officer).await;
    let request_id = schedule["approval_request_id"].as_i64().unwrap();
    let token = app.token_for(&officer);

    let response = post_json_auth(
        app.router(),
        &format!("/api/v1/approvals/{request_id}/reject"),
        &token,
        json!({ "comment": "Wrong amount" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "rejected");

    let response = get_auth(
        app.router(),
        &format!("/api/v1/disbursements/{}", schedule["id"]),
        &token,
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "cancelled");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancel_withdraws_the_pending_request(pool: PgPool) {
    let officer = create_user(&pool, "officer", "scholarship_officer", None).await;
    let app = common::build_test_app(pool).await;
    seed_cycle(&app, &officer).await;
    let schedule = create_schedule(&app, &officer).await;
    let request_id = schedule["approval_request_id"].as_i64().unwrap();
    let token = app.token_for(&officer);
    let cancel_uri = format!("/api/v1/disbursements/{}/cancel", schedule["id"]);

    let response = post_auth(app.router(), &cancel_uri, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "cancelled");

    let response = get_auth(app.router(), &format!("/api/v1/approvals/{request_id}"), &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "rejected");

    let response = post_auth(app.router(), &cancel_uri, &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_defines_workflows_one_per_request_type(pool: PgPool) {
    let admin = create_user(&pool, "admin", "admin", None).await;
    let app = common::build_test_app(pool).await;
    let token = app.token_for(&admin);

    let response = post_json_auth(
        app.router(),
        "/api/v1/workflows",
        &token,
        json!({
            "name": "Scholar reinstatement",
            "request_type": "reinstatement",
            "step_roles": ["registrar", "admin"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["steps"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["steps"][0]["role_name"], "registrar");

    // The seeded disbursement workflow already owns this type.
    let response = post_json_auth(
        app.router(),
        "/api/v1/workflows",
        &token,
        json!({
            "name": "Another disbursement flow",
            "request_type": "disbursement",
            "step_roles": ["admin"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_json_auth(
        app.router(),
        "/api/v1/workflows",
        &token,
        json!({
            "name": "Bad roles",
            "request_type": "other",
            "step_roles": ["janitor"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
