//! Route definitions for the `/maintenance` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::maintenance;
use crate::state::AppState;

/// Routes mounted at `/maintenance`.
///
/// ```text
/// GET    /branches                    -> list_branches
/// GET    /roles                       -> list_roles
/// GET    /responsibilities            -> list_responsibilities
/// PUT    /responsibilities/{role}     -> replace_responsibilities (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/branches", get(maintenance::list_branches))
        .route("/roles", get(maintenance::list_roles))
        .route("/responsibilities", get(maintenance::list_responsibilities))
        .route(
            "/responsibilities/{role}",
            put(maintenance::replace_responsibilities),
        )
}
