//! Handlers for the `/maintenance` resource: branches, roles, and
//! validator responsibilities.
//!
//! Reads are open to any authenticated user; changing responsibilities
//! requires `admin`.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use scholarship_core::error::CoreError;
use scholarship_core::responsibility::validate_fields;
use scholarship_db::models::reference::{Branch, Role, RoleResponsibilities};
use scholarship_db::repositories::ReferenceRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /maintenance/responsibilities/{role}`.
#[derive(Debug, Deserialize)]
pub struct ReplaceResponsibilitiesRequest {
    pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ResponsibilitiesResponse {
    pub role: String,
    pub fields: Vec<String>,
}

/// GET /api/v1/maintenance/branches
pub async fn list_branches(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Branch>>>> {
    let branches = ReferenceRepo::list_branches(&state.pool).await?;
    Ok(Json(DataResponse { data: branches }))
}

/// GET /api/v1/maintenance/roles
pub async fn list_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Role>>>> {
    let roles = ReferenceRepo::list_roles(&state.pool).await?;
    Ok(Json(DataResponse { data: roles }))
}

/// GET /api/v1/maintenance/responsibilities
pub async fn list_responsibilities(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<RoleResponsibilities>>>> {
    let rows = ReferenceRepo::list_responsibilities(&state.pool).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// PUT /api/v1/maintenance/responsibilities/{role}
///
/// Replace the full field set of one role. `All` grants every field.
pub async fn replace_responsibilities(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(role_name): Path<String>,
    Json(input): Json<ReplaceResponsibilitiesRequest>,
) -> AppResult<Json<DataResponse<ResponsibilitiesResponse>>> {
    validate_fields(&input.fields).map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let role = ReferenceRepo::find_role_by_name(&state.pool, &role_name)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{role_name}'")))?;

    let fields = ReferenceRepo::replace_responsibilities(&state.pool, role.id, &input.fields).await?;

    tracing::info!(
        role = %role.name,
        field_count = fields.len(),
        updated_by = admin.user_id,
        "Validator responsibilities replaced",
    );

    Ok(Json(DataResponse {
        data: ResponsibilitiesResponse {
            role: role.name,
            fields,
        },
    }))
}
