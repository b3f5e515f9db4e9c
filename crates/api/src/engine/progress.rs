//! Job progress reporting.
//!
//! Each update is written to the job row (which also refreshes the
//! heartbeat) and pushed to the submitter's WebSocket connections.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use scholarship_core::messages::WS_JOB_PROGRESS;
use scholarship_core::types::DbId;
use scholarship_db::repositories::ExtractionJobRepo;
use scholarship_extraction::ProgressSink;
use uuid::Uuid;

use crate::ws::WsManager;

/// Progress sink bound to one running job.
pub struct JobProgress {
    pool: PgPool,
    ws_manager: Arc<WsManager>,
    job_id: Uuid,
    submitted_by: DbId,
}

impl JobProgress {
    pub fn new(pool: PgPool, ws_manager: Arc<WsManager>, job_id: Uuid, submitted_by: DbId) -> Self {
        Self {
            pool,
            ws_manager,
            job_id,
            submitted_by,
        }
    }
}

#[async_trait]
impl ProgressSink for JobProgress {
    async fn report(&self, percent: i16, message: &str) {
        match ExtractionJobRepo::update_progress(&self.pool, self.job_id, percent, message).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(job_id = %self.job_id, "Progress for a job that is no longer processing");
            }
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Failed to record job progress");
            }
        }

        self.ws_manager
            .send_json_to_user(
                self.submitted_by,
                &json!({
                    "type": WS_JOB_PROGRESS,
                    "job_id": self.job_id,
                    "percent": percent,
                    "message": message,
                }),
            )
            .await;
    }
}
