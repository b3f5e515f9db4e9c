//! Approval workflow, step, request, and action models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scholarship_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `approval_workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalWorkflow {
    pub id: DbId,
    pub name: String,
    pub request_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A workflow step joined with its role name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowStep {
    pub id: DbId,
    pub workflow_id: DbId,
    pub step_order: i32,
    pub role_id: DbId,
    pub role_name: String,
}

/// Workflow with its ordered steps.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowWithSteps {
    #[serde(flatten)]
    pub workflow: ApprovalWorkflow,
    pub steps: Vec<WorkflowStep>,
}

/// DTO for creating a workflow. Step roles are given in order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub request_type: String,
    pub description: Option<String>,
    pub step_roles: Vec<String>,
}

/// A row from the `approval_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalRequest {
    pub id: DbId,
    pub workflow_id: DbId,
    pub request_type: String,
    pub entity_id: DbId,
    pub current_step: i32,
    pub status_id: StatusId,
    pub requested_by: DbId,
    pub decided_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `approval_actions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalAction {
    pub id: DbId,
    pub request_id: DbId,
    pub step_order: i32,
    pub decision: String,
    pub comment: Option<String>,
    pub acted_by: DbId,
    pub created_at: Timestamp,
}

/// Request with its history, for `GET /approvals/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequestDetail {
    #[serde(flatten)]
    pub request: ApprovalRequest,
    pub status: &'static str,
    pub steps: Vec<WorkflowStep>,
    pub actions: Vec<ApprovalAction>,
}

/// Query parameters for `GET /api/v1/approvals`.
#[derive(Debug, Default, Deserialize)]
pub struct ApprovalListQuery {
    /// Status name filter (`pending`, `approved`, `rejected`).
    pub status: Option<String>,
    /// Only requests whose current step belongs to the caller's role.
    pub mine: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
