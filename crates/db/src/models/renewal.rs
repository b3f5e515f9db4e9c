//! Renewal, validation, and validator models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scholarship_core::criteria::CriteriaSet;
use scholarship_core::derivation::ScholarshipStatus;
use scholarship_core::error::CoreError;
use scholarship_core::patch::ValidationPatch;
use scholarship_core::types::{DbId, Timestamp};

/// Scholar status values stored in `scholars.scholar_status`.
pub const SCHOLAR_ACTIVE: &str = "Active";
pub const SCHOLAR_DELISTED: &str = "Delisted";

/// A row from the `scholars` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scholar {
    pub id: DbId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub year_level: i16,
    pub branch_id: DbId,
    pub scholarship_type: String,
    pub scholar_status: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `validations` table.
#[derive(Debug, Clone, FromRow)]
pub struct Validation {
    pub id: DbId,
    pub renewal_id: DbId,
    pub gpa: Option<f64>,
    pub gpa_validation: String,
    pub no_failing_grade_validation: String,
    pub no_other_scholarship_validation: String,
    pub good_moral_validation: String,
    pub no_derogatory_record_validation: String,
    pub full_load_validation: String,
    pub withdrawal_change_validation: String,
    pub enrollment_validation: String,
    pub scholarship_status: String,
    pub delisted_date: Option<Timestamp>,
    pub delisting_root_cause: Option<String>,
}

impl Validation {
    /// Typed view of the eight criterion columns.
    pub fn criteria(&self) -> Result<CriteriaSet, CoreError> {
        CriteriaSet::from_columns([
            ("gpa_validation", self.gpa_validation.as_str()),
            ("no_failing_grade_validation", self.no_failing_grade_validation.as_str()),
            ("no_other_scholarship_validation", self.no_other_scholarship_validation.as_str()),
            ("good_moral_validation", self.good_moral_validation.as_str()),
            ("no_derogatory_record_validation", self.no_derogatory_record_validation.as_str()),
            ("full_load_validation", self.full_load_validation.as_str()),
            ("withdrawal_change_validation", self.withdrawal_change_validation.as_str()),
            ("enrollment_validation", self.enrollment_validation.as_str()),
        ])
    }

    pub fn status(&self) -> Result<ScholarshipStatus, CoreError> {
        self.scholarship_status.parse()
    }
}

/// A row from `vw_renewal_details`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenewalDetail {
    pub renewal_id: DbId,
    pub scholar_id: DbId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub branch_id: DbId,
    pub branch_name: String,
    pub scholarship_type: String,
    pub scholar_status: String,
    pub year_level: i16,
    pub semester: String,
    pub school_year: String,
    pub year_level_basis: i16,
    pub semester_basis: String,
    pub school_year_basis: String,
    pub renewal_date: Option<NaiveDate>,
    pub validation_id: DbId,
    pub gpa: Option<f64>,
    pub gpa_validation: String,
    pub no_failing_grade_validation: String,
    pub no_other_scholarship_validation: String,
    pub good_moral_validation: String,
    pub no_derogatory_record_validation: String,
    pub full_load_validation: String,
    pub withdrawal_change_validation: String,
    pub enrollment_validation: String,
    pub scholarship_status: String,
    pub delisted_date: Option<Timestamp>,
    pub delisting_root_cause: Option<String>,
    pub validated_count: i64,
    pub validator_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from `vw_renewal_validators`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenewalValidator {
    pub validator_id: DbId,
    pub renewal_id: DbId,
    pub validation_id: DbId,
    pub role_id: DbId,
    pub role_name: String,
    pub branch_id: DbId,
    pub is_validated: bool,
    pub validated_by: Option<DbId>,
    pub validated_by_username: Option<String>,
    pub validated_at: Option<Timestamp>,
}

/// A renewal waiting on the caller's role, with the validator row to use
/// when submitting batch updates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignedRenewal {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub renewal: RenewalDetail,
    pub validator_id: DbId,
    pub is_validated: bool,
}

/// One initialized renewal cycle.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenewalCycle {
    pub school_year: String,
    pub semester: String,
    pub renewal_count: i64,
    pub initialized_at: Timestamp,
}

/// Status counts for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RenewalSummary {
    pub total: i64,
    pub passed: i64,
    pub delisted: i64,
    pub not_started: i64,
    pub fully_validated: i64,
    /// Failed count per criterion column, in display order.
    pub failed_by_criterion: Vec<CriterionFailures>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriterionFailures {
    pub field: &'static str,
    pub label: &'static str,
    pub failed: i64,
}

/// Query parameters for `GET /api/v1/renewals`.
#[derive(Debug, Default, Deserialize)]
pub struct RenewalListQuery {
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub branch_id: Option<DbId>,
    pub scholarship_status: Option<String>,
    /// Matches student number or name (case-insensitive substring).
    pub search: Option<String>,
    /// Defaults to 50, capped at 500.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Result of initializing a renewal cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleInitResult {
    pub created: i64,
    pub skipped_existing: i64,
    pub renewal_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Batch update
// ---------------------------------------------------------------------------

/// One parsed row of a batch update.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub renewal_id: DbId,
    pub validator_id: Option<DbId>,
    pub patch: ValidationPatch,
}

/// The user applying a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchActor<'a> {
    pub user_id: DbId,
    pub role: &'a str,
    /// Branch the user is scoped to. `None` reaches every branch.
    pub branch_id: Option<DbId>,
}

/// A row that was not applied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub renewal_id: DbId,
    pub reason: String,
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    /// Renewal IDs that had at least one write.
    pub updated: Vec<DbId>,
    pub skipped: Vec<SkippedRow>,
    /// Renewals that moved into `Delisted` in this batch.
    pub newly_delisted: Vec<DbId>,
    /// Field names dropped by responsibility filtering, per renewal.
    pub dropped_fields: Vec<DroppedFields>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroppedFields {
    pub renewal_id: DbId,
    pub fields: Vec<&'static str>,
}
