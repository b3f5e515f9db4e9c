pub mod admin;
pub mod auth;
pub mod disbursement;
pub mod document;
pub mod health;
pub mod maintenance;
pub mod notification;
pub mod renewal;
pub mod workflow;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket (?token=)
///
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout (requires auth)
///
/// /admin/users                                     list, create (admin only)
/// /admin/users/{id}                                get, update
///
/// /maintenance/branches                            list
/// /maintenance/roles                               list
/// /maintenance/responsibilities                    list
/// /maintenance/responsibilities/{role}             replace (PUT, admin only)
///
/// /renewals                                        list
/// /renewals/initialize                             start a cycle (POST)
/// /renewals/cycles                                 initialized cycles
/// /renewals/summary                                status counts for a cycle
/// /renewals/assigned                               waiting on the caller's role
/// /renewals/batch-update                           batch validation update (POST)
/// /renewals/{id}                                   detail
/// /renewals/{id}/validators                        validator rows
///
/// /documents/extract                               upload, enqueue job (POST)
/// /documents/jobs                                  list
/// /documents/jobs/{id}                             poll
/// /documents/jobs/{id}/retry                       retry failed job (POST)
/// /documents/jobs/{id}/apply                       apply results (POST)
///
/// /disbursements                                   list, create
/// /disbursements/{id}                              detail
/// /disbursements/{id}/release                      release (POST)
/// /disbursements/{id}/cancel                       cancel (POST)
///
/// /workflows                                       list, create (admin only)
/// /workflows/{id}                                  detail
/// /approvals                                       list (?mine=true)
/// /approvals/{id}                                  detail with history
/// /approvals/{id}/approve                          approve current step (POST)
/// /approvals/{id}/reject                           reject (POST)
///
/// /notifications                                   list
/// /notifications/unread-count                      count
/// /notifications/{id}/read                         mark read (POST)
/// /notifications/read-all                          mark all read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
        .nest("/maintenance", maintenance::router())
        .nest("/renewals", renewal::router())
        .nest("/documents", document::router())
        .nest("/disbursements", disbursement::router())
        .nest("/workflows", workflow::workflow_router())
        .nest("/approvals", workflow::approval_router())
        .nest("/notifications", notification::router())
}
