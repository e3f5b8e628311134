use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::manager::DatabaseError;
use crate::database::models::Patient;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::tenant::BypassScope;

/// GET /api/admin/patients - every tenant's patients, platform admins only
pub async fn patients(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<ApiResponse<Value>, ApiError> {
    if !auth_user.is_platform_admin {
        tracing::warn!(principal_id = %auth_user.principal_id, "Non-admin attempted cross-tenant listing");
        return Err(ApiError::forbidden("Platform administrator access required"));
    }

    let patients = BypassScope::run("platform admin patient listing", async {
        let patients = state.db.query::<Patient>()?.order(json!("created_at asc"))?.select_all().await?;
        Ok::<_, DatabaseError>(patients)
    })
    .await?;

    Ok(ApiResponse::success(json!({ "patients": patients, "count": patients.len() })))
}
