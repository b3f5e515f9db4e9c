//! Handlers for approval workflows (`/workflows`) and the requests routed
//! through them (`/approvals`).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;
use scholarship_core::approval::{
    advance, check_step_role, validate_step_roles, Decision, StepOutcome,
};
use scholarship_core::error::CoreError;
use scholarship_core::event_types::{APPROVAL_APPROVED, APPROVAL_REJECTED, APPROVAL_REQUESTED};
use scholarship_core::types::DbId;
use scholarship_db::models::approval::{
    ApprovalListQuery, ApprovalRequest, ApprovalRequestDetail, CreateWorkflow, WorkflowWithSteps,
};
use scholarship_db::models::status::ApprovalStatus;
use scholarship_db::repositories::ApprovalRepo;
use scholarship_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /workflows`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "request_type must be 1-64 characters"))]
    pub request_type: String,
    pub description: Option<String>,
    /// Role names, one per step, in order.
    pub step_roles: Vec<String>,
}

/// Optional body for approve/reject.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DecisionRequest {
    #[validate(length(max = 2000, message = "comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// GET /api/v1/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<WorkflowWithSteps>>>> {
    let workflows = ApprovalRepo::list_workflows(&state.pool).await?;
    Ok(Json(DataResponse { data: workflows }))
}

/// POST /api/v1/workflows
///
/// One workflow per request type; a duplicate type is a 409.
pub async fn create_workflow(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateWorkflowRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<WorkflowWithSteps>>)> {
    input.validate()?;
    validate_step_roles(&input.step_roles)?;

    let workflow = ApprovalRepo::create_workflow(
        &state.pool,
        &CreateWorkflow {
            name: input.name,
            request_type: input.request_type,
            description: input.description,
            step_roles: input.step_roles,
        },
    )
    .await?;

    tracing::info!(
        workflow_id = workflow.workflow.id,
        request_type = %workflow.workflow.request_type,
        steps = workflow.steps.len(),
        created_by = admin.user_id,
        "Approval workflow created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowWithSteps>>> {
    let workflow = ApprovalRepo::find_workflow(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ApprovalWorkflow",
            id,
        }))?;
    Ok(Json(DataResponse { data: workflow }))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// GET /api/v1/approvals?status=&mine=
///
/// `mine=true` narrows to pending requests whose current step belongs to
/// the caller's role.
pub async fn list_approvals(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ApprovalListQuery>,
) -> AppResult<Json<DataResponse<Vec<ApprovalRequest>>>> {
    if let Some(status) = &params.status {
        if ApprovalStatus::from_name(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{status}'")));
        }
    }
    let role = params.mine.unwrap_or(false).then_some(auth.role.as_str());
    let requests = ApprovalRepo::list_requests(&state.pool, role, &params).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/approvals/{id}
pub async fn get_approval(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ApprovalRequestDetail>>> {
    let request = find_request(&state, id).await?;
    let detail = load_detail(&state, request).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/approvals/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    body: Option<Json<DecisionRequest>>,
) -> AppResult<Json<DataResponse<ApprovalRequestDetail>>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    decide(&state, &auth, id, Decision::Approve, input).await
}

/// POST /api/v1/approvals/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    body: Option<Json<DecisionRequest>>,
) -> AppResult<Json<DataResponse<ApprovalRequestDetail>>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    decide(&state, &auth, id, Decision::Reject, input).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn decide(
    state: &AppState,
    auth: &AuthUser,
    id: DbId,
    decision: Decision,
    input: DecisionRequest,
) -> AppResult<Json<DataResponse<ApprovalRequestDetail>>> {
    input.validate()?;
    let request = find_request(state, id).await?;

    if request.status_id != ApprovalStatus::Pending.id() {
        return Err(AppError::Core(CoreError::Conflict(
            "Request has already been decided".into(),
        )));
    }

    let step_role = ApprovalRepo::current_step_role(&state.pool, &request)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!(
                "Approval request {id} points at missing step {}",
                request.current_step
            ))
        })?;
    check_step_role(&step_role, &auth.role)?;

    let steps = ApprovalRepo::steps(&state.pool, request.workflow_id).await?;
    let outcome = advance(request.current_step, steps.len() as i32, decision);

    let updated = ApprovalRepo::record_decision(
        &state.pool,
        id,
        request.current_step,
        decision,
        outcome,
        auth.user_id,
        input.comment.as_deref(),
    )
    .await?
    .ok_or_else(|| {
        AppError::Core(CoreError::Conflict(
            "Request was decided by someone else".into(),
        ))
    })?;

    tracing::info!(
        request_id = id,
        step = request.current_step,
        decision = decision.as_str(),
        user_id = auth.user_id,
        outcome = ?outcome,
        "Approval decision recorded",
    );

    publish_outcome(state, auth.user_id, &updated, outcome, &steps);

    let detail = load_detail(state, updated).await?;
    Ok(Json(DataResponse { data: detail }))
}

fn publish_outcome(
    state: &AppState,
    actor_id: DbId,
    request: &ApprovalRequest,
    outcome: StepOutcome,
    steps: &[scholarship_db::models::approval::WorkflowStep],
) {
    let base = PlatformEvent::new(match outcome {
        StepOutcome::Rejected => APPROVAL_REJECTED,
        StepOutcome::Approved => APPROVAL_APPROVED,
        StepOutcome::Advance { .. } => APPROVAL_REQUESTED,
    })
    .with_source("approval_request", request.id)
    .with_actor(actor_id);

    let event = match outcome {
        StepOutcome::Approved | StepOutcome::Rejected => {
            let verb = if outcome == StepOutcome::Approved { "approved" } else { "rejected" };
            base.with_targets([request.requested_by]).with_payload(json!({
                "request_id": request.id,
                "request_type": request.request_type,
                "entity_id": request.entity_id,
                "message": format!(
                    "Your {} request #{} was {verb}",
                    request.request_type, request.id
                ),
            }))
        }
        StepOutcome::Advance { next_step } => {
            let Some(next) = steps.iter().find(|s| s.step_order == next_step) else {
                tracing::warn!(request_id = request.id, next_step, "Next approval step not found");
                return;
            };
            base.with_audience(next.role_name.clone()).with_payload(json!({
                "request_id": request.id,
                "request_type": request.request_type,
                "entity_id": request.entity_id,
                "step": next_step,
                "message": format!(
                    "{} request #{} awaits your approval (step {next_step} of {})",
                    request.request_type,
                    request.id,
                    steps.len()
                ),
            }))
        }
    };

    state.event_bus.publish(event);
}

async fn find_request(state: &AppState, id: DbId) -> AppResult<ApprovalRequest> {
    ApprovalRepo::find_request(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ApprovalRequest",
            id,
        }))
}

async fn load_detail(state: &AppState, request: ApprovalRequest) -> AppResult<ApprovalRequestDetail> {
    let steps = ApprovalRepo::steps(&state.pool, request.workflow_id).await?;
    let actions = ApprovalRepo::actions(&state.pool, request.id).await?;
    Ok(ApprovalRequestDetail {
        status: ApprovalStatus::from_id(request.status_id)
            .map(|s| s.name())
            .unwrap_or("unknown"),
        request,
        steps,
        actions,
    })
}
