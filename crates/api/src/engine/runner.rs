//! Background extraction runner.
//!
//! Polls the queue every `poll_interval` (or sooner when an upload wakes it)
//! and claims jobs with `FOR UPDATE SKIP LOCKED` via
//! [`ExtractionJobRepo::claim_next`] while concurrency permits remain.
//! Transient failures are retried in-process with exponential backoff;
//! everything else fails the job immediately.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use scholarship_core::event_types::{EXTRACTION_COMPLETED, EXTRACTION_FAILED};
use scholarship_core::extraction::{FileKind, RetryPolicy};
use scholarship_core::messages::{WS_JOB_COMPLETED, WS_JOB_FAILED};
use scholarship_core::types::DbId;
use scholarship_db::models::extraction_job::ExtractionJob;
use scholarship_db::repositories::ExtractionJobRepo;
use scholarship_events::{EventBus, PlatformEvent};
use scholarship_extraction::{ExtractionError, ExtractionOutput, Processor};
use scholarship_storage::{ObjectStore, StorageError};
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::engine::progress::JobProgress;
use crate::ws::WsManager;

/// Why a job attempt did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Unknown file kind '{0}'")]
    FileKind(String),

    /// Shutdown arrived while waiting to retry.
    #[error("Interrupted by shutdown")]
    Interrupted,
}

impl JobError {
    pub fn is_transient(&self) -> bool {
        match self {
            JobError::Storage(e) => matches!(e, StorageError::Io(_) | StorageError::Backend(_)),
            JobError::Extraction(e) => e.is_transient(),
            JobError::FileKind(_) | JobError::Interrupted => false,
        }
    }
}

/// Claims and processes extraction jobs.
pub struct ExtractionRunner {
    pool: PgPool,
    storage: Arc<dyn ObjectStore>,
    processor: Arc<Processor>,
    ws_manager: Arc<WsManager>,
    event_bus: Arc<EventBus>,
    config: ExtractionConfig,
    policy: RetryPolicy,
    wakeup: Arc<Notify>,
}

impl ExtractionRunner {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn ObjectStore>,
        processor: Arc<Processor>,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
        config: ExtractionConfig,
        wakeup: Arc<Notify>,
    ) -> Self {
        let policy = config.retry_policy();
        Self {
            pool,
            storage,
            processor,
            ws_manager,
            event_bus,
            config,
            policy,
            wakeup,
        }
    }

    /// Run until `cancel` fires. In-flight jobs are aborted on shutdown and
    /// left `processing`; the reaper re-queues them once their heartbeat
    /// goes stale.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        tracing::info!(
            concurrency = self.config.concurrency,
            max_attempts = self.config.max_attempts,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Extraction runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = tasks.len(), "Extraction runner shutting down");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.wakeup.notified() => {}
            }

            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Extraction task panicked");
                }
            }

            self.claim_available(&permits, &mut tasks, &cancel).await;
        }

        tasks.shutdown().await;
    }

    /// Claim jobs until the queue is empty or all permits are taken.
    async fn claim_available(
        self: &Arc<Self>,
        permits: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) {
        loop {
            let Ok(permit) = Arc::clone(permits).try_acquire_owned() else {
                return;
            };

            let job = match ExtractionJobRepo::claim_next(&self.pool).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim extraction job");
                    return;
                }
            };

            tracing::info!(
                job_id = %job.id,
                file_kind = %job.file_kind,
                attempt = job.attempts,
                "Extraction job claimed",
            );

            let runner = Arc::clone(self);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                runner.process_job(job, cancel).await;
                drop(permit);
            });
        }
    }

    /// Run one claimed job to a terminal state.
    pub async fn process_job(&self, job: ExtractionJob, cancel: CancellationToken) {
        let heartbeat = cancel.child_token();
        let heartbeat_task = tokio::spawn(keep_alive(
            self.pool.clone(),
            job.id,
            self.config.heartbeat_interval(),
            heartbeat.clone(),
        ));

        let outcome = self.execute(&job, &cancel).await;
        heartbeat.cancel();
        let _ = heartbeat_task.await;

        match outcome {
            Ok(output) => self.finish_completed(&job, &output).await,
            Err(JobError::Interrupted) => {
                tracing::info!(job_id = %job.id, "Extraction job interrupted, left for the reaper");
            }
            Err(e) => self.finish_failed(&job, &e.to_string()).await,
        }
    }

    async fn execute(
        &self,
        job: &ExtractionJob,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput, JobError> {
        let kind = FileKind::from_db(&job.file_kind)
            .map_err(|_| JobError::FileKind(job.file_kind.clone()))?;
        let sink = JobProgress::new(
            self.pool.clone(),
            Arc::clone(&self.ws_manager),
            job.id,
            job.submitted_by,
        );

        let mut attempts = job.attempts;
        loop {
            let result = async {
                let bytes = self.storage.get(&job.object_key).await?;
                let output = self
                    .processor
                    .process(kind, &job.original_filename, &bytes, &sink)
                    .await?;
                Ok::<_, JobError>(output)
            }
            .await;

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && self.policy.can_retry(attempts) => {
                    let delay = self.policy.delay_for(attempts);
                    tracing::warn!(
                        job_id = %job.id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient extraction failure, retrying",
                    );
                    if let Err(db) =
                        ExtractionJobRepo::record_retry(&self.pool, job.id, &e.to_string()).await
                    {
                        tracing::error!(job_id = %job.id, error = %db, "Failed to record retry");
                    }
                    attempts += 1;

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(JobError::Interrupted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn finish_completed(&self, job: &ExtractionJob, output: &ExtractionOutput) {
        let result = match serde_json::to_value(output) {
            Ok(value) => value,
            Err(e) => {
                self.finish_failed(job, &format!("Could not encode result: {e}")).await;
                return;
            }
        };

        match ExtractionJobRepo::complete(&self.pool, job.id, &result).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(job_id = %job.id, "Job left processing before completion was recorded");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                return;
            }
        }

        tracing::info!(
            job_id = %job.id,
            students = output.students.len(),
            skipped = output.skipped.len(),
            "Extraction job completed",
        );

        self.ws_manager
            .send_json_to_user(
                job.submitted_by,
                &json!({
                    "type": WS_JOB_COMPLETED,
                    "job_id": job.id,
                    "students": output.students.len(),
                    "skipped": output.skipped.len(),
                }),
            )
            .await;

        self.event_bus.publish(
            PlatformEvent::new(EXTRACTION_COMPLETED)
                .with_actor(job.submitted_by)
                .with_targets([job.submitted_by])
                .with_payload(json!({
                    "job_id": job.id,
                    "filename": job.original_filename,
                    "students": output.students.len(),
                    "message": format!(
                        "{}: grades extracted for {} student(s)",
                        job.original_filename,
                        output.students.len()
                    ),
                })),
        );
    }

    async fn finish_failed(&self, job: &ExtractionJob, error: &str) {
        match ExtractionJobRepo::fail(&self.pool, job.id, error).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(job_id = %job.id, "Job left processing before failure was recorded");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job failed");
                return;
            }
        }

        tracing::warn!(job_id = %job.id, error, "Extraction job failed");
        notify_failed(
            &self.ws_manager,
            &self.event_bus,
            job.id,
            job.submitted_by,
            &job.original_filename,
            error,
        )
        .await;
    }
}

/// Push `job_failed` and publish `extraction.failed`. Shared with the reaper.
pub async fn notify_failed(
    ws_manager: &WsManager,
    event_bus: &EventBus,
    job_id: Uuid,
    submitted_by: DbId,
    filename: &str,
    error: &str,
) {
    ws_manager
        .send_json_to_user(
            submitted_by,
            &json!({
                "type": WS_JOB_FAILED,
                "job_id": job_id,
                "error": error,
            }),
        )
        .await;

    event_bus.publish(
        PlatformEvent::new(EXTRACTION_FAILED)
            .with_actor(submitted_by)
            .with_targets([submitted_by])
            .with_payload(json!({
                "job_id": job_id,
                "filename": filename,
                "error": error,
                "message": format!("{filename}: {error}"),
            })),
    );
}

/// Refresh the job heartbeat until `stop` fires.
async fn keep_alive(
    pool: PgPool,
    job_id: Uuid,
    every: std::time::Duration,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                match ExtractionJobRepo::heartbeat(&pool, job_id).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Heartbeat failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scholarship_extraction::DocumentAiError;

    use super::*;

    #[test]
    fn storage_outages_are_transient() {
        assert!(JobError::Storage(StorageError::Backend("503".into())).is_transient());
        assert!(!JobError::Storage(StorageError::NotFound("k".into())).is_transient());
    }

    #[test]
    fn ocr_classification_carries_through() {
        let transient = ExtractionError::Ocr(DocumentAiError::Status {
            status: 503,
            body: String::new(),
        });
        assert!(JobError::from(transient).is_transient());
        assert!(!JobError::from(ExtractionError::Parse("no rows".into())).is_transient());
        assert!(!JobError::Interrupted.is_transient());
        assert!(!JobError::FileKind("docx".into()).is_transient());
    }
}
