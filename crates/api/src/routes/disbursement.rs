//! Route definitions for the `/disbursements` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::disbursement;
use crate::state::AppState;

/// Routes mounted at `/disbursements`.
///
/// ```text
/// GET    /                        -> list_disbursements
/// POST   /                        -> create_disbursement (officer)
/// GET    /{id}                    -> get_disbursement
/// POST   /{id}/release            -> release_disbursement (officer)
/// POST   /{id}/cancel             -> cancel_disbursement (officer)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(disbursement::list_disbursements).post(disbursement::create_disbursement),
        )
        .route("/{id}", get(disbursement::get_disbursement))
        .route("/{id}/release", post(disbursement::release_disbursement))
        .route("/{id}/cancel", post(disbursement::cancel_disbursement))
}
