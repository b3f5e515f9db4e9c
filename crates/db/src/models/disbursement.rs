//! Disbursement schedule and entry models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scholarship_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `disbursement_schedules` table with its entry totals.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DisbursementSchedule {
    pub id: DbId,
    pub title: String,
    pub school_year: String,
    pub semester: String,
    pub branch_id: Option<DbId>,
    pub amount_cents: i64,
    pub release_date: NaiveDate,
    pub status_id: StatusId,
    pub approval_request_id: Option<DbId>,
    pub created_by: DbId,
    pub released_at: Option<Timestamp>,
    pub entry_count: i64,
    pub total_cents: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An entry joined with scholar details.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DisbursementEntry {
    pub id: DbId,
    pub schedule_id: DbId,
    pub renewal_id: DbId,
    pub scholar_id: DbId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub amount_cents: i64,
}

/// Schedule with entries, for `GET /disbursements/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct DisbursementDetail {
    #[serde(flatten)]
    pub schedule: DisbursementSchedule,
    pub status: &'static str,
    pub entries: Vec<DisbursementEntry>,
}

/// DTO for creating a schedule. Amount already converted to centavos.
#[derive(Debug, Clone)]
pub struct CreateDisbursement {
    pub title: String,
    pub school_year: String,
    pub semester: String,
    pub branch_id: Option<DbId>,
    pub amount_cents: i64,
    pub release_date: NaiveDate,
    pub created_by: DbId,
}

/// Query parameters for `GET /api/v1/disbursements`.
#[derive(Debug, Default, Deserialize)]
pub struct DisbursementListQuery {
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
