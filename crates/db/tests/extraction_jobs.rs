mod common;

use assert_matches::assert_matches;
use serde_json::json;
use sqlx::PgPool;
use scholarship_core::types::DbId;
use scholarship_db::models::extraction_job::{CreateExtractionJob, ExtractionJobListQuery};
use scholarship_db::models::status::ExtractionJobStatus;
use scholarship_db::repositories::ExtractionJobRepo;
use uuid::Uuid;

use common::seed_user;

fn new_job(submitted_by: DbId, max_attempts: i32) -> CreateExtractionJob {
    let id = Uuid::now_v7();
    CreateExtractionJob {
        id,
        file_kind: "pdf".into(),
        original_filename: "grades.pdf".into(),
        object_key: format!("extractions/{id}/grades.pdf"),
        size_bytes: 1024,
        school_year: Some("2025-2026".into()),
        semester: Some("1st Semester".into()),
        max_attempts,
        submitted_by,
    }
}

/// Push a processing job's heartbeat into the past.
async fn age_heartbeat(pool: &PgPool, id: Uuid, secs: i64) {
    sqlx::query(
        "UPDATE extraction_jobs SET heartbeat_at = NOW() - make_interval(secs => $2) WHERE id = $1",
    )
    .bind(id)
    .bind(secs as f64)
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_progress_complete(pool: PgPool) {
    let user = seed_user(&pool, "registrar", "registrar").await;
    let job = ExtractionJobRepo::create(&pool, &new_job(user, 3)).await.unwrap();
    assert_matches!(job.status(), Some(ExtractionJobStatus::Pending));

    let claimed = ExtractionJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.attempts, 1);
    assert!(claimed.heartbeat_at.is_some());
    assert!(ExtractionJobRepo::claim_next(&pool).await.unwrap().is_none());

    assert!(ExtractionJobRepo::update_progress(&pool, job.id, 40, "Reading page 1").await.unwrap());

    let result = json!({ "students": [] });
    assert!(ExtractionJobRepo::complete(&pool, job.id, &result).await.unwrap());

    let done = ExtractionJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_matches!(done.status(), Some(ExtractionJobStatus::Completed));
    assert_eq!(done.progress_percent, 100);
    assert_eq!(done.result, Some(result));
    assert!(done.completed_at.is_some());

    // Terminal jobs ignore late writes.
    assert!(!ExtractionJobRepo::fail(&pool, job.id, "late").await.unwrap());
    assert!(!ExtractionJobRepo::heartbeat(&pool, job.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reaper_requeues_then_times_out(pool: PgPool) {
    let user = seed_user(&pool, "registrar", "registrar").await;
    let job = ExtractionJobRepo::create(&pool, &new_job(user, 2)).await.unwrap();

    ExtractionJobRepo::claim_next(&pool).await.unwrap().unwrap();
    age_heartbeat(&pool, job.id, 600).await;
    let reaped = ExtractionJobRepo::reap_stale(&pool, 300).await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].status_id, ExtractionJobStatus::Pending.id());

    let again = ExtractionJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(again.attempts, 2);
    age_heartbeat(&pool, job.id, 600).await;
    let reaped = ExtractionJobRepo::reap_stale(&pool, 300).await.unwrap();
    assert_eq!(reaped[0].status_id, ExtractionJobStatus::TimedOut.id());

    let timed_out = ExtractionJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_matches!(timed_out.status(), Some(ExtractionJobStatus::TimedOut));
    assert!(timed_out.completed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fresh_heartbeats_are_not_reaped(pool: PgPool) {
    let user = seed_user(&pool, "registrar", "registrar").await;
    ExtractionJobRepo::create(&pool, &new_job(user, 3)).await.unwrap();
    ExtractionJobRepo::claim_next(&pool).await.unwrap().unwrap();

    assert!(ExtractionJobRepo::reap_stale(&pool, 300).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retry_creates_linked_job(pool: PgPool) {
    let user = seed_user(&pool, "registrar", "registrar").await;
    let job = ExtractionJobRepo::create(&pool, &new_job(user, 3)).await.unwrap();
    ExtractionJobRepo::claim_next(&pool).await.unwrap().unwrap();
    ExtractionJobRepo::fail(&pool, job.id, "Unsupported file").await.unwrap();

    let failed = ExtractionJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("Unsupported file"));

    let retry = ExtractionJobRepo::retry(&pool, &failed, Uuid::now_v7(), user)
        .await
        .unwrap();
    assert_eq!(retry.retry_of_job_id, Some(job.id));
    assert_eq!(retry.object_key, failed.object_key);
    assert_eq!(retry.attempts, 0);
    assert_matches!(retry.status(), Some(ExtractionJobStatus::Pending));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_owner_and_status(pool: PgPool) {
    let a = seed_user(&pool, "a", "registrar").await;
    let b = seed_user(&pool, "b", "registrar").await;
    ExtractionJobRepo::create(&pool, &new_job(a, 3)).await.unwrap();
    ExtractionJobRepo::create(&pool, &new_job(b, 3)).await.unwrap();

    let mine = ExtractionJobRepo::list(&pool, Some(a), &ExtractionJobListQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let query = ExtractionJobListQuery {
        status: Some("completed".into()),
        ..Default::default()
    };
    assert!(ExtractionJobRepo::list(&pool, None, &query).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn mark_applied_only_once(pool: PgPool) {
    let user = seed_user(&pool, "registrar", "registrar").await;
    let job = ExtractionJobRepo::create(&pool, &new_job(user, 3)).await.unwrap();

    assert!(ExtractionJobRepo::mark_applied(&pool, job.id).await.unwrap());
    assert!(!ExtractionJobRepo::mark_applied(&pool, job.id).await.unwrap());
}
