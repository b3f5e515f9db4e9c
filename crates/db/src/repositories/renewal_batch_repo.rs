//! Transactional batch update of renewal validations.
//!
//! Each row is checked against the caller's role and the validator's
//! responsibilities, then split into per-table writes. The whole batch runs
//! in one transaction: a statement error rolls everything back.

use chrono::Utc;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use scholarship_core::derivation::{derive, ScholarshipStatus};
use scholarship_core::responsibility::{drop_frozen_fields, filter_patch};
use scholarship_core::roles::{is_blanket_role, ROLE_ADMIN};
use scholarship_core::types::DbId;

use crate::models::renewal::{
    BatchActor, BatchOutcome, BatchRow, DroppedFields, SkippedRow, Validation, SCHOLAR_ACTIVE,
    SCHOLAR_DELISTED,
};

const VALIDATION_COLUMNS: &str = "\
    v.id, v.renewal_id, v.gpa, \
    v.gpa_validation, v.no_failing_grade_validation, v.no_other_scholarship_validation, \
    v.good_moral_validation, v.no_derogatory_record_validation, v.full_load_validation, \
    v.withdrawal_change_validation, v.enrollment_validation, \
    v.scholarship_status, v.delisted_date, v.delisting_root_cause";

/// Validator row joined with its role, locked for the batch.
#[derive(Debug, FromRow)]
struct LockedValidator {
    id: DbId,
    validation_id: DbId,
    role_id: DbId,
    role_name: String,
    branch_id: DbId,
    is_validated: bool,
}

/// Per-row decision before any write happens.
enum RowPlan {
    Skip(String),
    Apply {
        validation: Validation,
        scholar_id: DbId,
        validator_id: Option<DbId>,
    },
}

/// Applies batch updates.
pub struct RenewalBatchRepo;

impl RenewalBatchRepo {
    /// Apply `rows` as `actor` inside one transaction.
    pub async fn apply(
        pool: &PgPool,
        actor: BatchActor<'_>,
        rows: Vec<BatchRow>,
    ) -> Result<BatchOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut outcome = BatchOutcome::default();

        for mut row in rows {
            let plan = plan_row(&mut *tx, actor, &mut row, &mut outcome).await?;
            let (validation, scholar_id, validator_id) = match plan {
                RowPlan::Skip(reason) => {
                    tracing::debug!(renewal_id = row.renewal_id, %reason, "Batch row skipped");
                    outcome.skipped.push(SkippedRow {
                        renewal_id: row.renewal_id,
                        reason,
                    });
                    continue;
                }
                RowPlan::Apply {
                    validation,
                    scholar_id,
                    validator_id,
                } => (validation, scholar_id, validator_id),
            };

            if row.patch.touches_validation() {
                let newly_delisted =
                    write_validation(&mut *tx, &validation, scholar_id, &row).await?;
                if newly_delisted {
                    outcome.newly_delisted.push(row.renewal_id);
                }
            }

            if let Some(date) = row.patch.renewal_date {
                sqlx::query("UPDATE renewals SET renewal_date = $2 WHERE id = $1")
                    .bind(row.renewal_id)
                    .bind(date)
                    .execute(&mut *tx)
                    .await?;
            }

            if let (Some(flag), Some(validator_id)) = (row.patch.is_validated, validator_id) {
                sqlx::query(
                    "UPDATE validators SET
                        is_validated = $2,
                        validated_by = CASE WHEN $2 THEN $3 ELSE NULL END,
                        validated_at = CASE WHEN $2 THEN NOW() ELSE NULL END
                     WHERE id = $1",
                )
                .bind(validator_id)
                .bind(flag)
                .bind(actor.user_id)
                .execute(&mut *tx)
                .await?;
            }

            outcome.updated.push(row.renewal_id);
        }

        tx.commit().await?;

        tracing::info!(
            user_id = actor.user_id,
            role = actor.role,
            updated = outcome.updated.len(),
            skipped = outcome.skipped.len(),
            delisted = outcome.newly_delisted.len(),
            "Renewal batch applied",
        );
        Ok(outcome)
    }
}

/// Lock the row's validation (and validator) and decide whether it applies.
/// Filters `row.patch` down to the permitted fields.
async fn plan_row(
    conn: &mut PgConnection,
    actor: BatchActor<'_>,
    row: &mut BatchRow,
    outcome: &mut BatchOutcome,
) -> Result<RowPlan, sqlx::Error> {
    let query = format!(
        "SELECT {VALIDATION_COLUMNS}, r.scholar_id, s.branch_id AS scholar_branch_id
         FROM validations v
         JOIN renewals r ON r.id = v.renewal_id
         JOIN scholars s ON s.id = r.scholar_id
         WHERE v.renewal_id = $1
         FOR UPDATE OF v"
    );
    let found: Option<(DbId, DbId, Validation)> = sqlx::query(&query)
        .bind(row.renewal_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|r| {
            Ok::<_, sqlx::Error>((
                r.try_get("scholar_id")?,
                r.try_get("scholar_branch_id")?,
                Validation::from_row(&r)?,
            ))
        })
        .transpose()?;
    let Some((scholar_id, scholar_branch_id, validation)) = found else {
        return Ok(RowPlan::Skip("Renewal not found".into()));
    };

    let (permission_role_id, validator_id) = match row.validator_id {
        Some(validator_id) => {
            let validator = sqlx::query_as::<_, LockedValidator>(
                "SELECT vr.id, vr.validation_id, vr.role_id, ro.name AS role_name, vr.branch_id,
                        vr.is_validated
                 FROM validators vr JOIN roles ro ON ro.id = vr.role_id
                 WHERE vr.id = $1
                 FOR UPDATE OF vr",
            )
            .bind(validator_id)
            .fetch_optional(&mut *conn)
            .await?;

            let Some(validator) = validator.filter(|v| v.validation_id == validation.id) else {
                return Ok(RowPlan::Skip(
                    "Validator does not belong to this renewal".into(),
                ));
            };
            if actor.role != validator.role_name && actor.role != ROLE_ADMIN {
                return Ok(RowPlan::Skip(format!(
                    "Role '{}' cannot act as the {} validator",
                    actor.role, validator.role_name
                )));
            }
            if outside_branch(actor, validator.branch_id) {
                return Ok(RowPlan::Skip(
                    "Validator belongs to another branch".into(),
                ));
            }
            if validator.is_validated && actor.role != ROLE_ADMIN {
                return Ok(RowPlan::Skip(
                    "Already validated; only an admin can change it".into(),
                ));
            }
            (validator.role_id, Some(validator.id))
        }
        None => {
            if !is_blanket_role(actor.role) {
                return Ok(RowPlan::Skip(
                    "validator_id is required for this role".into(),
                ));
            }
            if outside_branch(actor, scholar_branch_id) {
                return Ok(RowPlan::Skip(
                    "Scholar belongs to another branch".into(),
                ));
            }
            // No validator row to sign off on.
            row.patch.is_validated = None;
            let role_id: DbId = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
                .bind(actor.role)
                .fetch_one(&mut *conn)
                .await?;
            (role_id, None)
        }
    };

    let permitted: Vec<String> = sqlx::query_scalar(
        "SELECT field_name FROM validator_responsibilities WHERE role_id = $1",
    )
    .bind(permission_role_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut dropped = filter_patch(&mut row.patch, &permitted);

    // Without a validator row, fields owned by signed-off validators stay
    // frozen for everyone but admin.
    let mut frozen_dropped = false;
    if validator_id.is_none() && actor.role != ROLE_ADMIN && !row.patch.is_empty() {
        let frozen: Vec<String> = sqlx::query_scalar(
            "SELECT vres.field_name
             FROM validators vr
             JOIN validator_responsibilities vres ON vres.role_id = vr.role_id
             WHERE vr.validation_id = $1 AND vr.is_validated",
        )
        .bind(validation.id)
        .fetch_all(&mut *conn)
        .await?;
        let frozen_fields = drop_frozen_fields(&mut row.patch, &frozen);
        frozen_dropped = !frozen_fields.is_empty();
        dropped.extend(frozen_fields);
    }

    if !dropped.is_empty() {
        outcome.dropped_fields.push(DroppedFields {
            renewal_id: row.renewal_id,
            fields: dropped,
        });
    }
    if row.patch.is_empty() {
        let reason = if frozen_dropped {
            "Already validated; only an admin can change it"
        } else {
            "No permitted fields to update"
        };
        return Ok(RowPlan::Skip(reason.into()));
    }

    Ok(RowPlan::Apply {
        validation,
        scholar_id,
        validator_id,
    })
}

/// Whether a branch-scoped, non-admin actor is outside `branch_id`.
fn outside_branch(actor: BatchActor<'_>, branch_id: DbId) -> bool {
    actor.role != ROLE_ADMIN && actor.branch_id.is_some_and(|own| own != branch_id)
}

/// Merge the patch into the stored validation, re-derive, write, and sync
/// the scholar status. Returns `true` when the row became delisted.
async fn write_validation(
    conn: &mut PgConnection,
    current: &Validation,
    scholar_id: DbId,
    row: &BatchRow,
) -> Result<bool, sqlx::Error> {
    let decode = |e: scholarship_core::error::CoreError| sqlx::Error::Decode(Box::new(e));

    let mut criteria = current.criteria().map_err(decode)?;
    let mut gpa = current.gpa;
    row.patch.apply_to(&mut criteria, &mut gpa);

    let previous_status = current.status().map_err(decode)?;
    let previous_date = if previous_status == ScholarshipStatus::Delisted {
        current.delisted_date
    } else {
        None
    };
    let derived = derive(&criteria, previous_date, Utc::now());

    let states: Vec<&'static str> = criteria.iter().map(|(_, s)| s.as_str()).collect();
    sqlx::query(
        "UPDATE validations SET
            gpa_validation = $2,
            no_failing_grade_validation = $3,
            no_other_scholarship_validation = $4,
            good_moral_validation = $5,
            no_derogatory_record_validation = $6,
            full_load_validation = $7,
            withdrawal_change_validation = $8,
            enrollment_validation = $9,
            gpa = $10,
            scholarship_status = $11,
            delisted_date = $12,
            delisting_root_cause = $13
         WHERE id = $1",
    )
    .bind(current.id)
    .bind(states[0])
    .bind(states[1])
    .bind(states[2])
    .bind(states[3])
    .bind(states[4])
    .bind(states[5])
    .bind(states[6])
    .bind(states[7])
    .bind(gpa)
    .bind(derived.status.as_str())
    .bind(derived.delisted_date)
    .bind(&derived.root_cause)
    .execute(&mut *conn)
    .await?;

    let (from, to) = if derived.is_delisted() {
        (SCHOLAR_ACTIVE, SCHOLAR_DELISTED)
    } else {
        (SCHOLAR_DELISTED, SCHOLAR_ACTIVE)
    };
    sqlx::query("UPDATE scholars SET scholar_status = $3 WHERE id = $1 AND scholar_status = $2")
        .bind(scholar_id)
        .bind(from)
        .bind(to)
        .execute(&mut *conn)
        .await?;

    Ok(derived.is_delisted() && previous_status != ScholarshipStatus::Delisted)
}
