//! Handlers for the `/renewals` resource: cycle initialization, listing,
//! and the batch validation update.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use scholarship_core::error::CoreError;
use scholarship_core::event_types::{RENEWAL_CYCLE_INITIALIZED, RENEWAL_DELISTED, RENEWAL_UPDATED};
use scholarship_core::messages::WS_RENEWAL_UPDATED;
use scholarship_core::patch::ValidationPatch;
use scholarship_core::renewal_cycle::Term;
use scholarship_core::roles::ROLE_SCHOLARSHIP_OFFICER;
use scholarship_core::types::DbId;
use scholarship_db::models::renewal::{
    AssignedRenewal, BatchActor, BatchOutcome, BatchRow, CycleInitResult, RenewalCycle,
    RenewalDetail, RenewalListQuery, RenewalSummary, RenewalValidator,
};
use scholarship_db::repositories::{RenewalBatchRepo, RenewalRepo};
use scholarship_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireOfficer;
use crate::query::CycleParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest batch accepted in one request.
const MAX_BATCH_ROWS: usize = 500;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /renewals/initialize`.
#[derive(Debug, Deserialize)]
pub struct InitializeCycleRequest {
    pub school_year: String,
    pub semester: String,
    /// Restrict the cycle to one branch; all branches when absent.
    pub branch_id: Option<DbId>,
}

/// Request body for `POST /renewals/batch-update`.
#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub updates: Vec<BatchUpdateRow>,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateRow {
    pub renewal_id: DbId,
    pub validator_id: Option<DbId>,
    pub changed_fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct BatchUpdateResponse {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    pub updated_count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/renewals/initialize
///
/// Create one renewal per active scholar for the target term. Scholars
/// that already have a renewal for the term are counted and skipped.
pub async fn initialize_cycle(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Json(input): Json<InitializeCycleRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CycleInitResult>>)> {
    let term = Term::parse(&input.school_year, &input.semester)?;

    let result =
        RenewalRepo::initialize_cycle(&state.pool, term, input.branch_id, officer.user_id).await?;

    tracing::info!(
        school_year = %term.school_year,
        semester = %term.semester,
        branch_id = ?input.branch_id,
        created = result.created,
        skipped_existing = result.skipped_existing,
        "Renewal cycle initialized",
    );

    state.event_bus.publish(
        PlatformEvent::new(RENEWAL_CYCLE_INITIALIZED)
            .with_actor(officer.user_id)
            .with_payload(json!({
                "school_year": term.school_year.to_string(),
                "semester": term.semester.as_str(),
                "branch_id": input.branch_id,
                "created": result.created,
                "skipped_existing": result.skipped_existing,
            })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /api/v1/renewals
pub async fn list_renewals(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<RenewalListQuery>,
) -> AppResult<Json<DataResponse<Vec<RenewalDetail>>>> {
    let renewals = RenewalRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: renewals }))
}

/// GET /api/v1/renewals/cycles
pub async fn list_cycles(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<RenewalCycle>>>> {
    let cycles = RenewalRepo::list_cycles(&state.pool).await?;
    Ok(Json(DataResponse { data: cycles }))
}

/// GET /api/v1/renewals/summary?school_year=&semester=&branch_id=
pub async fn get_summary(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<CycleParams>,
) -> AppResult<Json<DataResponse<RenewalSummary>>> {
    let (Some(school_year), Some(semester)) = (&params.school_year, &params.semester) else {
        return Err(AppError::BadRequest(
            "school_year and semester are required".into(),
        ));
    };

    let summary =
        RenewalRepo::summary(&state.pool, school_year, semester, params.branch_id).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/renewals/assigned?school_year=&semester=
///
/// Renewals still waiting on the caller's role. Branch-scoped users only
/// see their own branch.
pub async fn list_assigned(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<CycleParams>,
) -> AppResult<Json<DataResponse<Vec<AssignedRenewal>>>> {
    let branch_id = auth.branch_id.or(params.branch_id);
    let renewals = RenewalRepo::list_assigned(
        &state.pool,
        &auth.role,
        branch_id,
        params.school_year.as_deref(),
        params.semester.as_deref(),
    )
    .await?;
    Ok(Json(DataResponse { data: renewals }))
}

/// GET /api/v1/renewals/{id}
pub async fn get_renewal(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RenewalDetail>>> {
    let renewal = RenewalRepo::find_detail(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Renewal",
            id,
        }))?;
    Ok(Json(DataResponse { data: renewal }))
}

/// GET /api/v1/renewals/{id}/validators
pub async fn list_validators(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<RenewalValidator>>>> {
    if RenewalRepo::find_detail(&state.pool, id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Renewal",
            id,
        }));
    }
    let validators = RenewalRepo::list_validators(&state.pool, id).await?;
    Ok(Json(DataResponse { data: validators }))
}

/// POST /api/v1/renewals/batch-update
///
/// Apply every row in one transaction. Rows the caller may not touch are
/// reported under `skipped`; a database error rolls back the whole batch.
pub async fn batch_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<BatchUpdateRequest>,
) -> AppResult<Json<DataResponse<BatchUpdateResponse>>> {
    if input.updates.is_empty() {
        return Err(AppError::BadRequest("updates must not be empty".into()));
    }
    if input.updates.len() > MAX_BATCH_ROWS {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_BATCH_ROWS} rows per batch"
        )));
    }

    let rows = parse_rows(input.updates)?;
    let row_count = rows.len();

    let outcome = RenewalBatchRepo::apply(
        &state.pool,
        BatchActor {
            user_id: auth.user_id,
            role: &auth.role,
            branch_id: auth.branch_id,
        },
        rows,
    )
    .await?;

    tracing::info!(
        user_id = auth.user_id,
        role = %auth.role,
        rows = row_count,
        updated = outcome.updated.len(),
        skipped = outcome.skipped.len(),
        newly_delisted = outcome.newly_delisted.len(),
        "Batch validation update applied",
    );

    publish_batch_outcome(&state, auth.user_id, &outcome, "batch_update").await;

    Ok(Json(DataResponse {
        data: BatchUpdateResponse {
            updated_count: outcome.updated.len(),
            outcome,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_rows(updates: Vec<BatchUpdateRow>) -> AppResult<Vec<BatchRow>> {
    updates
        .into_iter()
        .map(|row| {
            let patch = ValidationPatch::from_json(&row.changed_fields).map_err(|e| match e {
                CoreError::Validation(msg) => AppError::Core(CoreError::Validation(format!(
                    "Renewal {}: {msg}",
                    row.renewal_id
                ))),
                other => AppError::Core(other),
            })?;
            Ok(BatchRow {
                renewal_id: row.renewal_id,
                validator_id: row.validator_id,
                patch,
            })
        })
        .collect()
}

/// Publish `renewal.updated`, push the `renewal_updated` refetch hint, and
/// publish `renewal.delisted` for each renewal that just became Delisted.
///
/// Shared by the batch endpoint and extraction apply.
pub(crate) async fn publish_batch_outcome(
    state: &AppState,
    actor_id: DbId,
    outcome: &BatchOutcome,
    origin: &str,
) {
    if outcome.updated.is_empty() {
        return;
    }

    state.event_bus.publish(
        PlatformEvent::new(RENEWAL_UPDATED)
            .with_actor(actor_id)
            .with_payload(json!({
                "renewal_ids": outcome.updated,
                "origin": origin,
            })),
    );

    state
        .ws_manager
        .broadcast_json(&json!({
            "type": WS_RENEWAL_UPDATED,
            "renewal_ids": outcome.updated,
        }))
        .await;

    if outcome.newly_delisted.is_empty() {
        return;
    }

    let details = match RenewalRepo::find_details(&state.pool, &outcome.newly_delisted).await {
        Ok(details) => details,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load delisted renewals for notification");
            return;
        }
    };

    for detail in details {
        state.event_bus.publish(
            PlatformEvent::new(RENEWAL_DELISTED)
                .with_source("renewal", detail.renewal_id)
                .with_actor(actor_id)
                .with_audience(ROLE_SCHOLARSHIP_OFFICER)
                .with_payload(delisted_payload(&detail)),
        );
    }
}

fn delisted_payload(detail: &RenewalDetail) -> Value {
    let cause = detail
        .delisting_root_cause
        .as_deref()
        .unwrap_or("criteria failed");
    json!({
        "renewal_id": detail.renewal_id,
        "student_number": detail.student_number,
        "school_year": detail.school_year,
        "semester": detail.semester,
        "root_cause": detail.delisting_root_cause,
        "message": format!(
            "{} {} ({}) was delisted for {} {}. {}",
            detail.first_name,
            detail.last_name,
            detail.student_number,
            detail.semester,
            detail.school_year,
            cause,
        ),
    })
}
