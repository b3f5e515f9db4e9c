//! Stale extraction job reaper.
//!
//! A `processing` job whose heartbeat is older than the timeout belonged to
//! a runner that crashed or was shut down. It goes back to `pending` while
//! attempts remain, otherwise to `timed_out`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use scholarship_db::models::status::ExtractionJobStatus;
use scholarship_db::repositories::ExtractionJobRepo;
use scholarship_events::EventBus;

use crate::engine::runner::notify_failed;
use crate::ws::WsManager;

/// Everything a reap pass needs besides the pool.
pub struct Reaper {
    pub pool: PgPool,
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
    /// Woken when jobs are re-queued.
    pub runner_wakeup: Arc<Notify>,
    pub timeout_secs: i64,
}

impl Reaper {
    /// One pass. Returns `(requeued, timed_out)`.
    pub async fn reap_once(&self) -> Result<(usize, usize), sqlx::Error> {
        let reaped = ExtractionJobRepo::reap_stale(&self.pool, self.timeout_secs).await?;

        let mut requeued = 0;
        let mut timed_out = 0;
        for job in reaped {
            match ExtractionJobStatus::from_id(job.status_id) {
                Some(ExtractionJobStatus::Pending) => {
                    requeued += 1;
                    tracing::warn!(job_id = %job.id, "Stale extraction job re-queued");
                }
                _ => {
                    timed_out += 1;
                    tracing::warn!(job_id = %job.id, "Stale extraction job timed out");
                    let filename = ExtractionJobRepo::find_by_id(&self.pool, job.id)
                        .await?
                        .map(|j| j.original_filename)
                        .unwrap_or_default();
                    notify_failed(
                        &self.ws_manager,
                        &self.event_bus,
                        job.id,
                        job.submitted_by,
                        &filename,
                        "Heartbeat timed out",
                    )
                    .await;
                }
            }
        }

        if requeued > 0 {
            self.runner_wakeup.notify_one();
        }
        Ok((requeued, timed_out))
    }

    /// Run the reaper loop until `cancel` fires.
    pub async fn run(self, every: Duration, cancel: CancellationToken) {
        tracing::info!(
            timeout_secs = self.timeout_secs,
            interval_secs = every.as_secs(),
            "Extraction job reaper started"
        );

        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Extraction job reaper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.reap_once().await {
                        Ok((0, 0)) => tracing::debug!("Job reaper: nothing stale"),
                        Ok((requeued, timed_out)) => {
                            tracing::info!(requeued, timed_out, "Job reaper: stale jobs handled");
                        }
                        Err(e) => tracing::error!(error = %e, "Job reaper: pass failed"),
                    }
                }
            }
        }
    }
}
