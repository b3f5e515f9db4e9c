//! Repository for the `extraction_jobs` task queue.
//!
//! Every status write is guarded by the expected current status so a job
//! moved by the reaper cannot be overwritten by a late runner.

use sqlx::PgPool;
use scholarship_core::types::DbId;
use uuid::Uuid;

use crate::models::extraction_job::{
    CreateExtractionJob, ExtractionJob, ExtractionJobListQuery, ReapedJob,
};
use crate::models::status::{ExtractionJobStatus, StatusId};

const COLUMNS: &str = "\
    id, status_id, file_kind, original_filename, object_key, size_bytes, \
    school_year, semester, progress_percent, progress_message, attempts, max_attempts, \
    result, error_message, submitted_by, retry_of_job_id, applied_at, \
    started_at, completed_at, heartbeat_at, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Queue operations for extraction jobs.
pub struct ExtractionJobRepo;

impl ExtractionJobRepo {
    /// Enqueue a pending job.
    pub async fn create(
        pool: &PgPool,
        input: &CreateExtractionJob,
    ) -> Result<ExtractionJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO extraction_jobs
                (id, status_id, file_kind, original_filename, object_key, size_bytes,
                 school_year, semester, max_attempts, submitted_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExtractionJob>(&query)
            .bind(input.id)
            .bind(ExtractionJobStatus::Pending.id())
            .bind(&input.file_kind)
            .bind(&input.original_filename)
            .bind(&input.object_key)
            .bind(input.size_bytes)
            .bind(&input.school_year)
            .bind(&input.semester)
            .bind(input.max_attempts)
            .bind(input.submitted_by)
            .fetch_one(pool)
            .await
    }

    /// Claim the oldest pending job, moving it to `processing` and counting
    /// the attempt.
    ///
    /// `SKIP LOCKED` keeps concurrent runners from claiming the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<ExtractionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE extraction_jobs
             SET status_id = $1, attempts = attempts + 1,
                 started_at = COALESCE(started_at, NOW()), heartbeat_at = NOW(),
                 progress_percent = 0, progress_message = 'Claimed'
             WHERE id = (
                 SELECT id FROM extraction_jobs
                 WHERE status_id = $2
                 ORDER BY created_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExtractionJob>(&query)
            .bind(ExtractionJobStatus::Processing.id())
            .bind(ExtractionJobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Update progress and heartbeat. Returns `false` if the job is no
    /// longer processing.
    pub async fn update_progress(
        pool: &PgPool,
        id: Uuid,
        percent: i16,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE extraction_jobs
             SET progress_percent = $2, progress_message = $3, heartbeat_at = NOW()
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(percent.clamp(0, 100))
        .bind(message)
        .bind(ExtractionJobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Heartbeat only.
    pub async fn heartbeat(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE extraction_jobs SET heartbeat_at = NOW() WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(ExtractionJobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count another in-process attempt after a transient failure.
    pub async fn record_retry(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE extraction_jobs
             SET attempts = attempts + 1, error_message = $2, heartbeat_at = NOW(),
                 progress_message = 'Retrying after transient error'
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(error)
        .bind(ExtractionJobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark completed with the result payload.
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, id, ExtractionJobStatus::Completed, Some(result), None).await
    }

    /// Mark failed with an error message.
    pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        Self::finish(pool, id, ExtractionJobStatus::Failed, None, Some(error)).await
    }

    async fn finish(
        pool: &PgPool,
        id: Uuid,
        status: ExtractionJobStatus,
        result: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let done = sqlx::query(
            "UPDATE extraction_jobs
             SET status_id = $2, result = $3, error_message = $4, completed_at = NOW(),
                 progress_percent = CASE WHEN $2 = $6 THEN 100 ELSE progress_percent END,
                 progress_message = CASE WHEN $2 = $6 THEN 'Completed' ELSE 'Failed' END
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(status.id())
        .bind(result)
        .bind(error)
        .bind(ExtractionJobStatus::Processing.id())
        .bind(ExtractionJobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Move processing jobs whose heartbeat is older than `timeout_secs`
    /// back to `pending` (attempts left) or to `timed_out`.
    pub async fn reap_stale(
        pool: &PgPool,
        timeout_secs: i64,
    ) -> Result<Vec<ReapedJob>, sqlx::Error> {
        sqlx::query_as::<_, ReapedJob>(
            "UPDATE extraction_jobs
             SET status_id = CASE WHEN attempts < max_attempts THEN $2 ELSE $3 END,
                 error_message = 'Heartbeat timed out',
                 completed_at = CASE WHEN attempts < max_attempts THEN NULL ELSE NOW() END,
                 progress_message = CASE WHEN attempts < max_attempts
                                         THEN 'Re-queued after timeout' ELSE 'Timed out' END
             WHERE status_id = $1
               AND COALESCE(heartbeat_at, started_at, created_at)
                   < NOW() - make_interval(secs => $4)
             RETURNING id, status_id, submitted_by",
        )
        .bind(ExtractionJobStatus::Processing.id())
        .bind(ExtractionJobStatus::Pending.id())
        .bind(ExtractionJobStatus::TimedOut.id())
        .bind(timeout_secs as f64)
        .fetch_all(pool)
        .await
    }

    /// Create a new pending job over the same stored object.
    pub async fn retry(
        pool: &PgPool,
        original: &ExtractionJob,
        new_id: Uuid,
        user_id: DbId,
    ) -> Result<ExtractionJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO extraction_jobs
                (id, status_id, file_kind, original_filename, object_key, size_bytes,
                 school_year, semester, max_attempts, submitted_by, retry_of_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExtractionJob>(&query)
            .bind(new_id)
            .bind(ExtractionJobStatus::Pending.id())
            .bind(&original.file_kind)
            .bind(&original.original_filename)
            .bind(&original.object_key)
            .bind(original.size_bytes)
            .bind(&original.school_year)
            .bind(&original.semester)
            .bind(original.max_attempts)
            .bind(user_id)
            .bind(original.id)
            .fetch_one(pool)
            .await
    }

    /// Stamp `applied_at` once. Returns `false` if already applied.
    pub async fn mark_applied(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE extraction_jobs SET applied_at = NOW() WHERE id = $1 AND applied_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ExtractionJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM extraction_jobs WHERE id = $1");
        sqlx::query_as::<_, ExtractionJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, newest first. `submitted_by = None` lists everyone's.
    pub async fn list(
        pool: &PgPool,
        submitted_by: Option<DbId>,
        params: &ExtractionJobListQuery,
    ) -> Result<Vec<ExtractionJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let status_id: Option<StatusId> = params
            .status
            .as_deref()
            .and_then(ExtractionJobStatus::from_name)
            .map(ExtractionJobStatus::id);

        let query = format!(
            "SELECT {COLUMNS} FROM extraction_jobs
             WHERE ($1::BIGINT IS NULL OR submitted_by = $1)
               AND ($2::SMALLINT IS NULL OR status_id = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ExtractionJob>(&query)
            .bind(submitted_by)
            .bind(status_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
