//! Extraction job rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scholarship_core::types::{DbId, Timestamp};
use uuid::Uuid;

use super::status::{ExtractionJobStatus, StatusId};

/// A row from the `extraction_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub status_id: StatusId,
    pub file_kind: String,
    pub original_filename: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub progress_percent: i16,
    pub progress_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub submitted_by: DbId,
    pub retry_of_job_id: Option<Uuid>,
    pub applied_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub heartbeat_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ExtractionJob {
    pub fn status(&self) -> Option<ExtractionJobStatus> {
        ExtractionJobStatus::from_id(self.status_id)
    }
}

/// Polling view returned by `GET /documents/jobs/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionJobResponse {
    #[serde(flatten)]
    pub job: ExtractionJob,
    pub status: &'static str,
    pub is_terminal: bool,
}

impl From<ExtractionJob> for ExtractionJobResponse {
    fn from(job: ExtractionJob) -> Self {
        let status = job.status();
        Self {
            status: status.map(|s| s.name()).unwrap_or("unknown"),
            is_terminal: status.is_some_and(|s| s.is_terminal()),
            job,
        }
    }
}

/// DTO for enqueuing a job.
#[derive(Debug, Clone)]
pub struct CreateExtractionJob {
    pub id: Uuid,
    pub file_kind: String,
    pub original_filename: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub max_attempts: i32,
    pub submitted_by: DbId,
}

/// Query parameters for `GET /api/v1/documents/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct ExtractionJobListQuery {
    /// Filter by status name (e.g. `pending`, `failed`).
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A processing job moved by the stale-heartbeat reaper.
#[derive(Debug, Clone, FromRow)]
pub struct ReapedJob {
    pub id: Uuid,
    pub status_id: StatusId,
    pub submitted_by: DbId,
}
