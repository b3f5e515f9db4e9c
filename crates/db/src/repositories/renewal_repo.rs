//! Reads over the renewal views plus renewal-cycle initialization.

use sqlx::{PgPool, Row};
use scholarship_core::criteria::Criterion;
use scholarship_core::renewal_cycle::{plan_renewal, Term};
use scholarship_core::roles::VALIDATOR_ROLES;
use scholarship_core::types::DbId;

use crate::models::renewal::{
    AssignedRenewal, CriterionFailures, CycleInitResult, RenewalCycle, RenewalDetail,
    RenewalListQuery, RenewalSummary, RenewalValidator, Scholar, SCHOLAR_ACTIVE,
};

/// Column list for `vw_renewal_details` queries.
const DETAIL_COLUMNS: &str = "\
    d.renewal_id, d.scholar_id, d.student_number, d.first_name, d.last_name, \
    d.branch_id, d.branch_name, d.scholarship_type, d.scholar_status, \
    d.year_level, d.semester, d.school_year, \
    d.year_level_basis, d.semester_basis, d.school_year_basis, d.renewal_date, \
    d.validation_id, d.gpa, \
    d.gpa_validation, d.no_failing_grade_validation, d.no_other_scholarship_validation, \
    d.good_moral_validation, d.no_derogatory_record_validation, d.full_load_validation, \
    d.withdrawal_change_validation, d.enrollment_validation, \
    d.scholarship_status, d.delisted_date, d.delisting_root_cause, \
    d.validated_count, d.validator_count, d.created_at, d.updated_at";

const VALIDATOR_COLUMNS: &str = "\
    validator_id, renewal_id, validation_id, role_id, role_name, branch_id, \
    is_validated, validated_by, validated_by_username, validated_at";

const SCHOLAR_COLUMNS: &str = "\
    id, student_number, first_name, last_name, year_level, branch_id, \
    scholarship_type, scholar_status, email, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Renewal queries.
pub struct RenewalRepo;

impl RenewalRepo {
    /// Create renewal, validation, and validator rows for every active
    /// scholar (optionally one branch) in a single transaction.
    ///
    /// Scholars that already have a renewal for the term are skipped, so
    /// re-running for the same term is harmless.
    pub async fn initialize_cycle(
        pool: &PgPool,
        term: Term,
        branch_id: Option<DbId>,
        initialized_by: DbId,
    ) -> Result<CycleInitResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let scholars_query = format!(
            "SELECT {SCHOLAR_COLUMNS} FROM scholars
             WHERE scholar_status = $1 AND ($2::BIGINT IS NULL OR branch_id = $2)
             ORDER BY id"
        );
        let scholars = sqlx::query_as::<_, Scholar>(&scholars_query)
            .bind(SCHOLAR_ACTIVE)
            .bind(branch_id)
            .fetch_all(&mut *tx)
            .await?;

        let validator_roles: Vec<&str> = VALIDATOR_ROLES.to_vec();
        let mut result = CycleInitResult::default();

        for scholar in &scholars {
            let plan = plan_renewal(term, scholar.year_level);
            let renewal_id: Option<DbId> = sqlx::query_scalar(
                "INSERT INTO renewals
                    (scholar_id, year_level, semester, school_year,
                     year_level_basis, semester_basis, school_year_basis, initialized_by)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT ON CONSTRAINT uq_renewals_scholar_term DO NOTHING
                 RETURNING id",
            )
            .bind(scholar.id)
            .bind(plan.year_level)
            .bind(plan.semester.as_str())
            .bind(plan.school_year.to_string())
            .bind(plan.year_level_basis)
            .bind(plan.semester_basis.as_str())
            .bind(plan.school_year_basis.to_string())
            .bind(initialized_by)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(renewal_id) = renewal_id else {
                result.skipped_existing += 1;
                continue;
            };

            let validation_id: DbId = sqlx::query_scalar(
                "INSERT INTO validations (renewal_id) VALUES ($1) RETURNING id",
            )
            .bind(renewal_id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO validators (validation_id, role_id, branch_id)
                 SELECT $1, r.id, $2 FROM roles r WHERE r.name = ANY($3)",
            )
            .bind(validation_id)
            .bind(scholar.branch_id)
            .bind(&validator_roles)
            .execute(&mut *tx)
            .await?;

            result.created += 1;
            result.renewal_ids.push(renewal_id);
        }

        tx.commit().await?;
        Ok(result)
    }

    pub async fn find_detail(
        pool: &PgPool,
        renewal_id: DbId,
    ) -> Result<Option<RenewalDetail>, sqlx::Error> {
        let query = format!("SELECT {DETAIL_COLUMNS} FROM vw_renewal_details d WHERE d.renewal_id = $1");
        sqlx::query_as::<_, RenewalDetail>(&query)
            .bind(renewal_id)
            .fetch_optional(pool)
            .await
    }

    /// Details for a set of renewals, in ID order.
    pub async fn find_details(
        pool: &PgPool,
        renewal_ids: &[DbId],
    ) -> Result<Vec<RenewalDetail>, sqlx::Error> {
        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM vw_renewal_details d
             WHERE d.renewal_id = ANY($1) ORDER BY d.renewal_id"
        );
        sqlx::query_as::<_, RenewalDetail>(&query)
            .bind(renewal_ids)
            .fetch_all(pool)
            .await
    }

    /// Filtered, paginated listing ordered by last name.
    pub async fn list(
        pool: &PgPool,
        params: &RenewalListQuery,
    ) -> Result<Vec<RenewalDetail>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.school_year.is_some() {
            conditions.push(format!("d.school_year = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.semester.is_some() {
            conditions.push(format!("d.semester = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.branch_id.is_some() {
            conditions.push(format!("d.branch_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.scholarship_status.is_some() {
            conditions.push(format!("d.scholarship_status = ${bind_idx}"));
            bind_idx += 1;
        }
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));
        if search.is_some() {
            conditions.push(format!(
                "(d.student_number ILIKE ${bind_idx} OR d.first_name ILIKE ${bind_idx} \
                 OR d.last_name ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM vw_renewal_details d \
             {where_clause} \
             ORDER BY d.last_name, d.first_name, d.renewal_id \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, RenewalDetail>(&query);
        if let Some(sy) = &params.school_year {
            q = q.bind(sy);
        }
        if let Some(sem) = &params.semester {
            q = q.bind(sem);
        }
        if let Some(branch) = params.branch_id {
            q = q.bind(branch);
        }
        if let Some(status) = &params.scholarship_status {
            q = q.bind(status);
        }
        if let Some(pattern) = &search {
            q = q.bind(pattern);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Renewals with an unvalidated validator row for `role`, optionally
    /// restricted to one branch.
    pub async fn list_assigned(
        pool: &PgPool,
        role: &str,
        branch_id: Option<DbId>,
        school_year: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Vec<AssignedRenewal>, sqlx::Error> {
        let query = format!(
            "SELECT {DETAIL_COLUMNS}, vr.id AS validator_id, vr.is_validated
             FROM vw_renewal_details d
             JOIN validators vr ON vr.validation_id = d.validation_id
             JOIN roles ro ON ro.id = vr.role_id
             WHERE ro.name = $1
               AND NOT vr.is_validated
               AND ($2::BIGINT IS NULL OR vr.branch_id = $2)
               AND ($3::TEXT IS NULL OR d.school_year = $3)
               AND ($4::TEXT IS NULL OR d.semester = $4)
             ORDER BY d.last_name, d.first_name, d.renewal_id"
        );
        sqlx::query_as::<_, AssignedRenewal>(&query)
            .bind(role)
            .bind(branch_id)
            .bind(school_year)
            .bind(semester)
            .fetch_all(pool)
            .await
    }

    pub async fn list_validators(
        pool: &PgPool,
        renewal_id: DbId,
    ) -> Result<Vec<RenewalValidator>, sqlx::Error> {
        let query = format!(
            "SELECT {VALIDATOR_COLUMNS} FROM vw_renewal_validators
             WHERE renewal_id = $1 ORDER BY role_id"
        );
        sqlx::query_as::<_, RenewalValidator>(&query)
            .bind(renewal_id)
            .fetch_all(pool)
            .await
    }

    /// Initialized cycles, newest first.
    pub async fn list_cycles(pool: &PgPool) -> Result<Vec<RenewalCycle>, sqlx::Error> {
        sqlx::query_as::<_, RenewalCycle>(
            "SELECT school_year, semester, COUNT(*) AS renewal_count, MIN(created_at) AS initialized_at
             FROM renewals
             GROUP BY school_year, semester
             ORDER BY school_year DESC, semester DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Status counts and per-criterion failures for one cycle.
    pub async fn summary(
        pool: &PgPool,
        school_year: &str,
        semester: &str,
        branch_id: Option<DbId>,
    ) -> Result<RenewalSummary, sqlx::Error> {
        let criterion_counts: Vec<String> = Criterion::ALL
            .iter()
            .map(|c| {
                let col = c.column();
                format!("COUNT(*) FILTER (WHERE d.{col} = 'Failed') AS {col}")
            })
            .collect();
        let query = format!(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE d.scholarship_status = 'Passed') AS passed,
                    COUNT(*) FILTER (WHERE d.scholarship_status = 'Delisted') AS delisted,
                    COUNT(*) FILTER (WHERE d.scholarship_status = 'Not Started') AS not_started,
                    COUNT(*) FILTER (WHERE d.validator_count > 0
                                       AND d.validated_count = d.validator_count) AS fully_validated,
                    {}
             FROM vw_renewal_details d
             WHERE d.school_year = $1 AND d.semester = $2
               AND ($3::BIGINT IS NULL OR d.branch_id = $3)",
            criterion_counts.join(",\n                    ")
        );
        let row = sqlx::query(&query)
            .bind(school_year)
            .bind(semester)
            .bind(branch_id)
            .fetch_one(pool)
            .await?;

        let failed_by_criterion = Criterion::ALL
            .iter()
            .map(|c| {
                Ok(CriterionFailures {
                    field: c.column(),
                    label: c.label(),
                    failed: row.try_get::<i64, _>(c.column())?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(RenewalSummary {
            total: row.try_get("total")?,
            passed: row.try_get("passed")?,
            delisted: row.try_get("delisted")?,
            not_started: row.try_get("not_started")?,
            fully_validated: row.try_get("fully_validated")?,
            failed_by_criterion,
        })
    }

    /// Map student numbers to renewal IDs within one cycle.
    pub async fn ids_by_student_numbers(
        pool: &PgPool,
        school_year: &str,
        semester: &str,
        student_numbers: &[String],
    ) -> Result<Vec<(String, DbId)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT d.student_number, d.renewal_id FROM vw_renewal_details d
             WHERE d.school_year = $1 AND d.semester = $2 AND d.student_number = ANY($3)",
        )
        .bind(school_year)
        .bind(semester)
        .bind(student_numbers)
        .fetch_all(pool)
        .await
    }

    /// The validator row of `role` on a renewal, if one exists.
    pub async fn validator_id_for_role(
        pool: &PgPool,
        renewal_id: DbId,
        role: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT validator_id FROM vw_renewal_validators WHERE renewal_id = $1 AND role_name = $2",
        )
        .bind(renewal_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }
}
