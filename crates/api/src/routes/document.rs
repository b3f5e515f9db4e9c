//! Route definitions for the `/documents` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use scholarship_core::extraction::MAX_UPLOAD_BYTES;

use crate::handlers::document;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Routes mounted at `/documents`.
///
/// ```text
/// POST   /extract                 -> extract (multipart, 202)
/// GET    /jobs                    -> list_jobs
/// GET    /jobs/{id}               -> get_job
/// POST   /jobs/{id}/retry         -> retry_job
/// POST   /jobs/{id}/apply         -> apply_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/extract",
            post(document::extract)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/jobs", get(document::list_jobs))
        .route("/jobs/{id}", get(document::get_job))
        .route("/jobs/{id}/retry", post(document::retry_job))
        .route("/jobs/{id}/apply", post(document::apply_job))
}
