//! Repository for disbursement schedules and their entries.

use sqlx::PgPool;
use scholarship_core::approval::REQUEST_TYPE_DISBURSEMENT;
use scholarship_core::derivation::ScholarshipStatus;
use scholarship_core::types::DbId;

use crate::models::disbursement::{
    CreateDisbursement, DisbursementEntry, DisbursementListQuery, DisbursementSchedule,
};
use crate::models::renewal::SCHOLAR_ACTIVE;
use crate::models::status::{DisbursementStatus, StatusId};
use crate::repositories::ApprovalRepo;

/// Schedule columns plus entry aggregates. Expects the schedule aliased `s`.
const COLUMNS: &str = "\
    s.id, s.title, s.school_year, s.semester, s.branch_id, s.amount_cents, \
    s.release_date, s.status_id, s.approval_request_id, s.created_by, s.released_at, \
    (SELECT COUNT(*) FROM disbursement_entries e WHERE e.schedule_id = s.id) AS entry_count, \
    (SELECT COALESCE(SUM(e.amount_cents), 0)::BIGINT FROM disbursement_entries e \
        WHERE e.schedule_id = s.id) AS total_cents, \
    s.created_at, s.updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Disbursement schedule persistence.
pub struct DisbursementRepo;

impl DisbursementRepo {
    /// Create a schedule and its entries in one transaction.
    ///
    /// Entries are taken from every renewal of the cycle (optionally limited
    /// to a branch) whose validation Passed and whose scholar is Active. The
    /// schedule then enters the `disbursement` approval workflow; without an
    /// active workflow it starts out approved.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDisbursement,
    ) -> Result<DisbursementSchedule, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let schedule_id: DbId = sqlx::query_scalar(
            "INSERT INTO disbursement_schedules
                (title, school_year, semester, branch_id, amount_cents, release_date,
                 status_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(&input.title)
        .bind(&input.school_year)
        .bind(&input.semester)
        .bind(input.branch_id)
        .bind(input.amount_cents)
        .bind(input.release_date)
        .bind(DisbursementStatus::PendingApproval.id())
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let entries = sqlx::query(
            "INSERT INTO disbursement_entries (schedule_id, renewal_id, scholar_id, amount_cents)
             SELECT $1, r.id, r.scholar_id, $2
             FROM renewals r
             JOIN validations v ON v.renewal_id = r.id
             JOIN scholars sc ON sc.id = r.scholar_id
             WHERE r.school_year = $3 AND r.semester = $4
               AND ($5::BIGINT IS NULL OR sc.branch_id = $5)
               AND v.scholarship_status = $6
               AND sc.scholar_status = $7",
        )
        .bind(schedule_id)
        .bind(input.amount_cents)
        .bind(&input.school_year)
        .bind(&input.semester)
        .bind(input.branch_id)
        .bind(ScholarshipStatus::Passed.as_str())
        .bind(SCHOLAR_ACTIVE)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let request = ApprovalRepo::open_request(
            &mut tx,
            REQUEST_TYPE_DISBURSEMENT,
            schedule_id,
            input.created_by,
        )
        .await?;

        match &request {
            Some(request) => {
                sqlx::query("UPDATE disbursement_schedules SET approval_request_id = $2 WHERE id = $1")
                    .bind(schedule_id)
                    .bind(request.id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE disbursement_schedules SET status_id = $2 WHERE id = $1")
                    .bind(schedule_id)
                    .bind(DisbursementStatus::Approved.id())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let query = format!("SELECT {COLUMNS} FROM disbursement_schedules s WHERE s.id = $1");
        let schedule = sqlx::query_as::<_, DisbursementSchedule>(&query)
            .bind(schedule_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            schedule_id,
            entries,
            approval_request_id = ?request.as_ref().map(|r| r.id),
            "Disbursement schedule created",
        );
        Ok(schedule)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DisbursementSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM disbursement_schedules s WHERE s.id = $1");
        sqlx::query_as::<_, DisbursementSchedule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        params: &DisbursementListQuery,
    ) -> Result<Vec<DisbursementSchedule>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let status_id: Option<StatusId> = params
            .status
            .as_deref()
            .and_then(DisbursementStatus::from_name)
            .map(DisbursementStatus::id);

        let query = format!(
            "SELECT {COLUMNS} FROM disbursement_schedules s
             WHERE ($1::TEXT IS NULL OR s.school_year = $1)
               AND ($2::TEXT IS NULL OR s.semester = $2)
               AND ($3::SMALLINT IS NULL OR s.status_id = $3)
             ORDER BY s.release_date DESC, s.id DESC
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, DisbursementSchedule>(&query)
            .bind(&params.school_year)
            .bind(&params.semester)
            .bind(status_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn entries(
        pool: &PgPool,
        schedule_id: DbId,
    ) -> Result<Vec<DisbursementEntry>, sqlx::Error> {
        sqlx::query_as::<_, DisbursementEntry>(
            "SELECT e.id, e.schedule_id, e.renewal_id, e.scholar_id,
                    sc.student_number, sc.first_name, sc.last_name, e.amount_cents
             FROM disbursement_entries e
             JOIN scholars sc ON sc.id = e.scholar_id
             WHERE e.schedule_id = $1
             ORDER BY sc.last_name, sc.first_name, e.id",
        )
        .bind(schedule_id)
        .fetch_all(pool)
        .await
    }

    /// Mark an approved schedule released. `None` when it was not approved.
    pub async fn release(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DisbursementSchedule>, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE disbursement_schedules SET status_id = $2, released_at = NOW()
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(DisbursementStatus::Released.id())
        .bind(DisbursementStatus::Approved.id())
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(pool, id).await
    }

    /// Cancel a schedule that is pending approval or approved, withdrawing
    /// its pending approval request. `None` when it cannot be cancelled.
    pub async fn cancel(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DisbursementSchedule>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let request_id: Option<Option<DbId>> = sqlx::query_scalar(
            "UPDATE disbursement_schedules SET status_id = $2
             WHERE id = $1 AND status_id IN ($3, $4)
             RETURNING approval_request_id",
        )
        .bind(id)
        .bind(DisbursementStatus::Cancelled.id())
        .bind(DisbursementStatus::PendingApproval.id())
        .bind(DisbursementStatus::Approved.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request_id) = request_id else {
            return Ok(None);
        };
        if let Some(request_id) = request_id {
            ApprovalRepo::withdraw(&mut tx, request_id).await?;
        }

        let query = format!("SELECT {COLUMNS} FROM disbursement_schedules s WHERE s.id = $1");
        let schedule = sqlx::query_as::<_, DisbursementSchedule>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(schedule))
    }
}
