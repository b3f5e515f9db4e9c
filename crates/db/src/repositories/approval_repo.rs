//! Repository for approval workflows and requests.

use sqlx::{PgConnection, PgPool};
use scholarship_core::approval::{Decision, StepOutcome};
use scholarship_core::types::DbId;

use crate::models::approval::{
    ApprovalAction, ApprovalListQuery, ApprovalRequest, ApprovalWorkflow, CreateWorkflow,
    WorkflowStep, WorkflowWithSteps,
};
use crate::models::status::{ApprovalStatus, DisbursementStatus, StatusId};

const WORKFLOW_COLUMNS: &str =
    "id, name, request_type, description, is_active, created_at, updated_at";

const REQUEST_COLUMNS: &str = "\
    id, workflow_id, request_type, entity_id, current_step, status_id, \
    requested_by, decided_at, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Workflow definitions and request routing.
pub struct ApprovalRepo;

impl ApprovalRepo {
    /// Create a workflow with its ordered steps in one transaction.
    ///
    /// Fails with a unique violation on `uq_approval_workflows_request_type`
    /// when the request type already has a workflow.
    pub async fn create_workflow(
        pool: &PgPool,
        input: &CreateWorkflow,
    ) -> Result<WorkflowWithSteps, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO approval_workflows (name, request_type, description)
             VALUES ($1, $2, $3)
             RETURNING {WORKFLOW_COLUMNS}"
        );
        let workflow = sqlx::query_as::<_, ApprovalWorkflow>(&query)
            .bind(&input.name)
            .bind(&input.request_type)
            .bind(&input.description)
            .fetch_one(&mut *tx)
            .await?;

        for (idx, role) in input.step_roles.iter().enumerate() {
            sqlx::query(
                "INSERT INTO approval_workflow_steps (workflow_id, step_order, role_id)
                 SELECT $1, $2, id FROM roles WHERE name = $3",
            )
            .bind(workflow.id)
            .bind(idx as i32 + 1)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        let steps = steps_for(&mut tx, workflow.id).await?;
        tx.commit().await?;
        Ok(WorkflowWithSteps { workflow, steps })
    }

    pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowWithSteps>, sqlx::Error> {
        let query = format!("SELECT {WORKFLOW_COLUMNS} FROM approval_workflows ORDER BY id");
        let workflows = sqlx::query_as::<_, ApprovalWorkflow>(&query)
            .fetch_all(pool)
            .await?;
        let mut conn = pool.acquire().await?;
        let mut out = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let steps = steps_for(&mut conn, workflow.id).await?;
            out.push(WorkflowWithSteps { workflow, steps });
        }
        Ok(out)
    }

    pub async fn find_workflow(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WorkflowWithSteps>, sqlx::Error> {
        let query = format!("SELECT {WORKFLOW_COLUMNS} FROM approval_workflows WHERE id = $1");
        let Some(workflow) = sqlx::query_as::<_, ApprovalWorkflow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };
        let mut conn = pool.acquire().await?;
        let steps = steps_for(&mut conn, workflow.id).await?;
        Ok(Some(WorkflowWithSteps { workflow, steps }))
    }

    /// Open a request on the active workflow for `request_type`.
    ///
    /// Returns `None` when no active workflow exists for the type.
    pub async fn open_request(
        conn: &mut PgConnection,
        request_type: &str,
        entity_id: DbId,
        requested_by: DbId,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        let query = format!(
            "INSERT INTO approval_requests (workflow_id, request_type, entity_id, status_id, requested_by)
             SELECT id, request_type, $2, $3, $4 FROM approval_workflows
             WHERE request_type = $1 AND is_active
             RETURNING {REQUEST_COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(request_type)
            .bind(entity_id)
            .bind(ApprovalStatus::Pending.id())
            .bind(requested_by)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_request(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        let query = format!("SELECT {REQUEST_COLUMNS} FROM approval_requests WHERE id = $1");
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn steps(pool: &PgPool, workflow_id: DbId) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        steps_for(&mut conn, workflow_id).await
    }

    pub async fn actions(pool: &PgPool, request_id: DbId) -> Result<Vec<ApprovalAction>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalAction>(
            "SELECT id, request_id, step_order, decision, comment, acted_by, created_at
             FROM approval_actions WHERE request_id = $1 ORDER BY id",
        )
        .bind(request_id)
        .fetch_all(pool)
        .await
    }

    /// List requests. When `role` is set, only pending requests whose
    /// current step belongs to that role are returned.
    pub async fn list_requests(
        pool: &PgPool,
        role: Option<&str>,
        params: &ApprovalListQuery,
    ) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let status_id: Option<StatusId> = params
            .status
            .as_deref()
            .and_then(ApprovalStatus::from_name)
            .map(ApprovalStatus::id);

        let query = format!(
            "SELECT {} FROM approval_requests ar
             WHERE ($1::SMALLINT IS NULL OR ar.status_id = $1)
               AND ($2::TEXT IS NULL OR (ar.status_id = $5 AND EXISTS (
                    SELECT 1 FROM approval_workflow_steps s JOIN roles r ON r.id = s.role_id
                    WHERE s.workflow_id = ar.workflow_id AND s.step_order = ar.current_step
                      AND r.name = $2)))
             ORDER BY ar.created_at DESC
             LIMIT $3 OFFSET $4",
            prefixed(REQUEST_COLUMNS, "ar")
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(status_id)
            .bind(role)
            .bind(limit)
            .bind(offset)
            .bind(ApprovalStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Record a decision and move the request.
    ///
    /// The update is guarded on the request still being pending at
    /// `expected_step`; `None` means someone else acted first. A final
    /// outcome also settles a linked disbursement schedule.
    pub async fn record_decision(
        pool: &PgPool,
        request_id: DbId,
        expected_step: i32,
        decision: Decision,
        outcome: StepOutcome,
        acted_by: DbId,
        comment: Option<&str>,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (next_step, status) = match outcome {
            StepOutcome::Advance { next_step } => (next_step, ApprovalStatus::Pending),
            StepOutcome::Approved => (expected_step, ApprovalStatus::Approved),
            StepOutcome::Rejected => (expected_step, ApprovalStatus::Rejected),
        };

        let query = format!(
            "UPDATE approval_requests
             SET current_step = $3, status_id = $4,
                 decided_at = CASE WHEN $4 = $5 THEN NULL ELSE NOW() END
             WHERE id = $1 AND current_step = $2 AND status_id = $5
             RETURNING {REQUEST_COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(request_id)
            .bind(expected_step)
            .bind(next_step)
            .bind(status.id())
            .bind(ApprovalStatus::Pending.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO approval_actions (request_id, step_order, decision, comment, acted_by)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(request_id)
        .bind(expected_step)
        .bind(decision.as_str())
        .bind(comment)
        .bind(acted_by)
        .execute(&mut *tx)
        .await?;

        let settled = match status {
            ApprovalStatus::Approved => Some(DisbursementStatus::Approved),
            ApprovalStatus::Rejected => Some(DisbursementStatus::Cancelled),
            ApprovalStatus::Pending => None,
        };
        if let Some(target) = settled {
            sqlx::query(
                "UPDATE disbursement_schedules SET status_id = $2
                 WHERE approval_request_id = $1 AND status_id = $3",
            )
            .bind(request_id)
            .bind(target.id())
            .bind(DisbursementStatus::PendingApproval.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(request))
    }

    /// Reject a pending request without an actor decision (e.g. the
    /// underlying entity was cancelled).
    pub async fn withdraw(conn: &mut PgConnection, request_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_requests SET status_id = $2, decided_at = NOW()
             WHERE id = $1 AND status_id = $3",
        )
        .bind(request_id)
        .bind(ApprovalStatus::Rejected.id())
        .bind(ApprovalStatus::Pending.id())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Role name of a request's current step.
    pub async fn current_step_role(
        pool: &PgPool,
        request: &ApprovalRequest,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT r.name FROM approval_workflow_steps s JOIN roles r ON r.id = s.role_id
             WHERE s.workflow_id = $1 AND s.step_order = $2",
        )
        .bind(request.workflow_id)
        .bind(request.current_step)
        .fetch_optional(pool)
        .await
    }
}

async fn steps_for(conn: &mut PgConnection, workflow_id: DbId) -> Result<Vec<WorkflowStep>, sqlx::Error> {
    sqlx::query_as::<_, WorkflowStep>(
        "SELECT s.id, s.workflow_id, s.step_order, s.role_id, r.name AS role_name
         FROM approval_workflow_steps s JOIN roles r ON r.id = s.role_id
         WHERE s.workflow_id = $1
         ORDER BY s.step_order",
    )
    .bind(workflow_id)
    .fetch_all(conn)
    .await
}

/// Prefix every column in a comma-separated list with `alias.`.
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
