//! Handlers for the `/documents` resource: grade-report uploads and the
//! extraction jobs they create.
//!
//! Uploads return 202 with a pending job; the extraction runner picks it up
//! in the background and clients poll `GET /documents/jobs/{id}`.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use scholarship_core::error::CoreError;
use scholarship_core::extraction::{object_key, FileKind, MAX_UPLOAD_BYTES};
use scholarship_core::renewal_cycle::Term;
use scholarship_core::roles::{ROLE_ADMIN, ROLE_REGISTRAR, ROLE_SCHOLARSHIP_OFFICER};
use scholarship_core::types::DbId;
use scholarship_db::models::extraction_job::{
    CreateExtractionJob, ExtractionJob, ExtractionJobListQuery, ExtractionJobResponse,
};
use scholarship_db::models::renewal::{BatchActor, BatchOutcome, BatchRow};
use scholarship_db::models::status::ExtractionJobStatus;
use scholarship_db::repositories::{ExtractionJobRepo, RenewalBatchRepo, RenewalRepo};
use scholarship_extraction::ExtractionOutput;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::renewal::publish_batch_outcome;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Roles allowed to upload grade reports and apply their results.
const EXTRACTION_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_REGISTRAR, ROLE_SCHOLARSHIP_OFFICER];

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /documents/jobs/{id}/apply`. Falls back to the
/// term given at upload time.
#[derive(Debug, Default, Deserialize)]
pub struct ApplyJobRequest {
    pub school_year: Option<String>,
    pub semester: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplyJobResponse {
    pub job_id: Uuid,
    pub school_year: String,
    pub semester: String,
    /// Students matched to a renewal in the cycle.
    pub matched: usize,
    /// Student IDs with no renewal in the cycle, or no ID at all.
    pub unmatched: Vec<String>,
    /// False when no row was written. The job can then be applied again,
    /// and `unmatched` or `skipped` says why.
    pub applied: bool,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/documents/extract
///
/// Multipart fields: `file` (required), `school_year` and `semester`
/// (optional, used later by apply).
pub async fn extract(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<ExtractionJobResponse>>)> {
    require_extraction_role(&auth)?;

    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut school_year: Option<String> = None;
    let mut semester: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                upload = Some((filename, content_type, data.to_vec()));
            }
            Some("school_year") => school_year = Some(text_field(field).await?),
            Some("semester") => semester = Some(text_field(field).await?),
            _ => {}
        }
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))?;

    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(format!(
            "File exceeds the {} MiB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    if let (Some(sy), Some(sem)) = (&school_year, &semester) {
        Term::parse(sy, sem)?;
    }

    let kind = FileKind::detect(&filename, content_type.as_deref())?;
    let job_id = Uuid::now_v7();
    let key = object_key(&job_id.to_string(), &filename);
    let size_bytes = data.len() as i64;

    state.storage.put(&key, data, kind.content_type()).await?;

    let job = ExtractionJobRepo::create(
        &state.pool,
        &CreateExtractionJob {
            id: job_id,
            file_kind: kind.as_str().to_string(),
            original_filename: filename,
            object_key: key,
            size_bytes,
            school_year,
            semester,
            max_attempts: state.config.extraction.max_attempts,
            submitted_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(
        job_id = %job.id,
        file_kind = %job.file_kind,
        size_bytes,
        user_id = auth.user_id,
        "Extraction job enqueued",
    );
    state.extraction_wakeup.notify_one();

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ExtractionJobResponse::from(job),
        }),
    ))
}

/// GET /api/v1/documents/jobs
///
/// Admins see every job; everyone else sees their own.
pub async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ExtractionJobListQuery>,
) -> AppResult<Json<DataResponse<Vec<ExtractionJobResponse>>>> {
    if let Some(status) = &params.status {
        if ExtractionJobStatus::from_name(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{status}'")));
        }
    }

    let owner = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };
    let jobs = ExtractionJobRepo::list(&state.pool, owner, &params).await?;
    Ok(Json(DataResponse {
        data: jobs.into_iter().map(ExtractionJobResponse::from).collect(),
    }))
}

/// GET /api/v1/documents/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ExtractionJobResponse>>> {
    let job = find_visible_job(&state, &auth, id).await?;
    Ok(Json(DataResponse {
        data: ExtractionJobResponse::from(job),
    }))
}

/// POST /api/v1/documents/jobs/{id}/retry
///
/// Start a new job over the same stored file. Only failed or timed-out
/// jobs can be retried.
pub async fn retry_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<DataResponse<ExtractionJobResponse>>)> {
    require_extraction_role(&auth)?;
    let original = find_visible_job(&state, &auth, id).await?;

    let status = original
        .status()
        .ok_or_else(|| AppError::InternalError(format!("Unknown job status {}", original.status_id)))?;
    if !status.is_retryable() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is {}; only failed or timed-out jobs can be retried",
            status.name()
        ))));
    }

    let job = ExtractionJobRepo::retry(&state.pool, &original, Uuid::now_v7(), auth.user_id).await?;
    tracing::info!(job_id = %job.id, retry_of = %original.id, user_id = auth.user_id, "Extraction job retried");
    state.extraction_wakeup.notify_one();

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ExtractionJobResponse::from(job),
        }),
    ))
}

/// POST /api/v1/documents/jobs/{id}/apply
///
/// Write a completed job's GWA and failing-grade results onto the
/// registrar validation of each matched renewal, through the batch update
/// path. A job can be applied once at least one row was written.
pub async fn apply_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ApplyJobRequest>>,
) -> AppResult<Json<DataResponse<ApplyJobResponse>>> {
    require_extraction_role(&auth)?;
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let job = find_visible_job(&state, &auth, id).await?;

    if job.status() != Some(ExtractionJobStatus::Completed) {
        return Err(AppError::Core(CoreError::Conflict(
            "Only completed jobs can be applied".into(),
        )));
    }
    if job.applied_at.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Job results were already applied".into(),
        )));
    }

    let school_year = input
        .school_year
        .or_else(|| job.school_year.clone())
        .ok_or_else(|| AppError::BadRequest("school_year is required".into()))?;
    let semester = input
        .semester
        .or_else(|| job.semester.clone())
        .ok_or_else(|| AppError::BadRequest("semester is required".into()))?;
    let term = Term::parse(&school_year, &semester)?;
    let school_year = term.school_year.to_string();
    let semester = term.semester.as_str().to_string();

    let output: ExtractionOutput = match &job.result {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| AppError::InternalError(format!("Corrupt job result: {e}")))?,
        None => ExtractionOutput::default(),
    };

    let student_numbers: Vec<String> = output
        .students
        .iter()
        .filter_map(|s| s.student_id.clone())
        .collect();
    let renewal_ids: HashMap<String, DbId> =
        RenewalRepo::ids_by_student_numbers(&state.pool, &school_year, &semester, &student_numbers)
            .await?
            .into_iter()
            .collect();

    let mut rows = Vec::new();
    let mut unmatched = Vec::new();
    for student in &output.students {
        let Some(student_id) = &student.student_id else {
            unmatched.push(student.student_name.clone().unwrap_or_else(|| "(unknown)".into()));
            continue;
        };
        let Some(&renewal_id) = renewal_ids.get(student_id) else {
            unmatched.push(student_id.clone());
            continue;
        };
        let validator_id =
            RenewalRepo::validator_id_for_role(&state.pool, renewal_id, ROLE_REGISTRAR).await?;
        rows.push(BatchRow {
            renewal_id,
            validator_id,
            patch: student.to_patch(),
        });
    }
    let matched = rows.len();

    let outcome = if rows.is_empty() {
        BatchOutcome::default()
    } else {
        RenewalBatchRepo::apply(
            &state.pool,
            BatchActor {
                user_id: auth.user_id,
                role: ROLE_REGISTRAR,
                branch_id: if auth.is_admin() { None } else { auth.branch_id },
            },
            rows,
        )
        .await?
    };

    // The patches are idempotent, so a concurrent apply that loses this
    // race has rewritten the same values.
    let applied = !outcome.updated.is_empty();
    if applied && !ExtractionJobRepo::mark_applied(&state.pool, job.id).await? {
        tracing::warn!(job_id = %job.id, "Extraction results applied concurrently");
    }

    tracing::info!(
        job_id = %job.id,
        school_year = %school_year,
        semester = %semester,
        matched,
        unmatched = unmatched.len(),
        updated = outcome.updated.len(),
        applied,
        "Extraction results applied",
    );

    publish_batch_outcome(&state, auth.user_id, &outcome, "extraction").await;

    Ok(Json(DataResponse {
        data: ApplyJobResponse {
            job_id: job.id,
            school_year,
            semester,
            matched,
            unmatched,
            applied,
            outcome,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_extraction_role(auth: &AuthUser) -> AppResult<()> {
    if EXTRACTION_ROLES.contains(&auth.role.as_str()) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "Extraction requires the registrar or scholarship officer role".into(),
        )))
    }
}

/// Non-admins only see jobs they submitted; other jobs read as missing.
async fn find_visible_job(state: &AppState, auth: &AuthUser, id: Uuid) -> AppResult<ExtractionJob> {
    ExtractionJobRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|job| auth.is_admin() || job.submitted_by == auth.user_id)
        .ok_or(AppError::Database(sqlx::Error::RowNotFound))
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map(|s| s.trim().to_string())
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: 1,
            role: role.to_string(),
            branch_id: None,
        }
    }

    #[test]
    fn only_grade_handling_roles_may_extract() {
        assert!(require_extraction_role(&user("registrar")).is_ok());
        assert!(require_extraction_role(&user("scholarship_officer")).is_ok());
        assert!(require_extraction_role(&user("admin")).is_ok());
        assert!(require_extraction_role(&user("hr")).is_err());
        assert!(require_extraction_role(&user("discipline_office")).is_err());
    }
}
