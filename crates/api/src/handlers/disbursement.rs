//! Handlers for the `/disbursements` resource.
//!
//! A schedule pays a fixed stipend to every Passed, Active scholar of a
//! cycle. New schedules go through the `disbursement` approval workflow and
//! can be released once approved.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;
use scholarship_core::approval::REQUEST_TYPE_DISBURSEMENT;
use scholarship_core::disbursement::{amount_to_cents, format_cents, validate_release_date};
use scholarship_core::error::CoreError;
use scholarship_core::event_types::{
    APPROVAL_REQUESTED, DISBURSEMENT_CANCELLED, DISBURSEMENT_RELEASED, DISBURSEMENT_SCHEDULED,
};
use scholarship_core::renewal_cycle::Term;
use scholarship_core::roles::ROLE_SCHOLARSHIP_OFFICER;
use scholarship_core::types::DbId;
use scholarship_db::models::disbursement::{
    CreateDisbursement, DisbursementDetail, DisbursementListQuery, DisbursementSchedule,
};
use scholarship_db::models::status::DisbursementStatus;
use scholarship_db::repositories::{ApprovalRepo, DisbursementRepo};
use scholarship_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireOfficer;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /disbursements`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDisbursementRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub school_year: String,
    pub semester: String,
    pub branch_id: Option<DbId>,
    /// Stipend per scholar, in pesos.
    pub amount: f64,
    pub release_date: NaiveDate,
}

/// GET /api/v1/disbursements
pub async fn list_disbursements(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<DisbursementListQuery>,
) -> AppResult<Json<DataResponse<Vec<DisbursementSchedule>>>> {
    if let Some(status) = &params.status {
        if DisbursementStatus::from_name(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{status}'")));
        }
    }
    let schedules = DisbursementRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: schedules }))
}

/// POST /api/v1/disbursements
pub async fn create_disbursement(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Json(input): Json<CreateDisbursementRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<DisbursementDetail>>)> {
    input.validate()?;
    let term = Term::parse(&input.school_year, &input.semester)?;
    let amount_cents = amount_to_cents(input.amount)?;
    validate_release_date(input.release_date, Utc::now().date_naive())?;

    let schedule = DisbursementRepo::create(
        &state.pool,
        &CreateDisbursement {
            title: input.title,
            school_year: term.school_year.to_string(),
            semester: term.semester.as_str().to_string(),
            branch_id: input.branch_id,
            amount_cents,
            release_date: input.release_date,
            created_by: officer.user_id,
        },
    )
    .await?;

    state.event_bus.publish(
        PlatformEvent::new(DISBURSEMENT_SCHEDULED)
            .with_source("disbursement", schedule.id)
            .with_actor(officer.user_id)
            .with_payload(json!({
                "schedule_id": schedule.id,
                "title": schedule.title,
                "entry_count": schedule.entry_count,
                "total": format_cents(schedule.total_cents),
            })),
    );

    if let Some(request_id) = schedule.approval_request_id {
        if let Some(request) = ApprovalRepo::find_request(&state.pool, request_id).await? {
            if let Some(role) = ApprovalRepo::current_step_role(&state.pool, &request).await? {
                state.event_bus.publish(
                    PlatformEvent::new(APPROVAL_REQUESTED)
                        .with_source("approval_request", request.id)
                        .with_actor(officer.user_id)
                        .with_audience(role)
                        .with_payload(json!({
                            "request_id": request.id,
                            "request_type": REQUEST_TYPE_DISBURSEMENT,
                            "entity_id": schedule.id,
                            "step": request.current_step,
                            "message": format!(
                                "Disbursement '{}' ({} scholars, {}) awaits your approval",
                                schedule.title,
                                schedule.entry_count,
                                format_cents(schedule.total_cents),
                            ),
                        })),
                );
            }
        }
    }

    let detail = load_detail(&state, schedule).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/disbursements/{id}
pub async fn get_disbursement(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DisbursementDetail>>> {
    let schedule = find_schedule(&state, id).await?;
    let detail = load_detail(&state, schedule).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/disbursements/{id}/release
///
/// Only approved schedules can be released.
pub async fn release_disbursement(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DisbursementDetail>>> {
    let current = find_schedule(&state, id).await?;

    let schedule = DisbursementRepo::release(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(format!(
                "Disbursement is {}; only approved schedules can be released",
                status_name(&current)
            )))
        })?;

    tracing::info!(schedule_id = id, user_id = officer.user_id, "Disbursement released");

    state.event_bus.publish(
        PlatformEvent::new(DISBURSEMENT_RELEASED)
            .with_source("disbursement", schedule.id)
            .with_actor(officer.user_id)
            .with_targets([schedule.created_by])
            .with_audience(ROLE_SCHOLARSHIP_OFFICER)
            .with_payload(json!({
                "schedule_id": schedule.id,
                "title": schedule.title,
                "entry_count": schedule.entry_count,
                "total": format_cents(schedule.total_cents),
                "message": format!(
                    "Disbursement '{}' was released to {} scholars ({})",
                    schedule.title,
                    schedule.entry_count,
                    format_cents(schedule.total_cents),
                ),
            })),
    );

    let detail = load_detail(&state, schedule).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/disbursements/{id}/cancel
///
/// Cancels a schedule that has not been released and withdraws its
/// pending approval request.
pub async fn cancel_disbursement(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DisbursementDetail>>> {
    let current = find_schedule(&state, id).await?;

    let schedule = DisbursementRepo::cancel(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(format!(
                "Disbursement is {} and cannot be cancelled",
                status_name(&current)
            )))
        })?;

    tracing::info!(schedule_id = id, user_id = officer.user_id, "Disbursement cancelled");

    state.event_bus.publish(
        PlatformEvent::new(DISBURSEMENT_CANCELLED)
            .with_source("disbursement", schedule.id)
            .with_actor(officer.user_id)
            .with_payload(json!({
                "schedule_id": schedule.id,
                "title": schedule.title,
            })),
    );

    let detail = load_detail(&state, schedule).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_schedule(state: &AppState, id: DbId) -> AppResult<DisbursementSchedule> {
    DisbursementRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "DisbursementSchedule",
            id,
        }))
}

async fn load_detail(
    state: &AppState,
    schedule: DisbursementSchedule,
) -> AppResult<DisbursementDetail> {
    let entries = DisbursementRepo::entries(&state.pool, schedule.id).await?;
    Ok(DisbursementDetail {
        status: status_name(&schedule),
        schedule,
        entries,
    })
}

fn status_name(schedule: &DisbursementSchedule) -> &'static str {
    DisbursementStatus::from_id(schedule.status_id)
        .map(|s| s.name())
        .unwrap_or("unknown")
}
