//! Route definitions for approval workflows and requests.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::approval;
use crate::state::AppState;

/// Routes mounted at `/workflows`.
///
/// ```text
/// GET    /                        -> list_workflows
/// POST   /                        -> create_workflow (admin)
/// GET    /{id}                    -> get_workflow
/// ```
pub fn workflow_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(approval::list_workflows).post(approval::create_workflow),
        )
        .route("/{id}", get(approval::get_workflow))
}

/// Routes mounted at `/approvals`.
///
/// ```text
/// GET    /                        -> list_approvals
/// GET    /{id}                    -> get_approval
/// POST   /{id}/approve            -> approve
/// POST   /{id}/reject             -> reject
/// ```
pub fn approval_router() -> Router<AppState> {
    Router::new()
        .route("/", get(approval::list_approvals))
        .route("/{id}", get(approval::get_approval))
        .route("/{id}/approve", post(approval::approve))
        .route("/{id}/reject", post(approval::reject))
}
