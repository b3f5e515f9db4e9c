//! Route definitions for the `/renewals` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::renewal;
use crate::state::AppState;

/// Routes mounted at `/renewals`.
///
/// ```text
/// GET    /                        -> list_renewals
/// POST   /initialize              -> initialize_cycle (officer)
/// GET    /cycles                  -> list_cycles
/// GET    /summary                 -> get_summary
/// GET    /assigned                -> list_assigned
/// POST   /batch-update            -> batch_update
/// GET    /{id}                    -> get_renewal
/// GET    /{id}/validators         -> list_validators
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(renewal::list_renewals))
        .route("/initialize", post(renewal::initialize_cycle))
        .route("/cycles", get(renewal::list_cycles))
        .route("/summary", get(renewal::get_summary))
        .route("/assigned", get(renewal::list_assigned))
        .route("/batch-update", post(renewal::batch_update))
        .route("/{id}", get(renewal::get_renewal))
        .route("/{id}/validators", get(renewal::list_validators))
}
