use axum::extract::{Json, Path, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::PageQuery;
use crate::app::AppState;
use crate::database::models::Patient;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::ApiResponse;
use crate::tenant::TenantContext;

#[derive(Debug, Deserialize)]
pub struct CreatePatient {
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
}

/// GET /api/patients - one page of the caller's patients
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let patients = state
        .db
        .query::<Patient>()?
        .filter(FilterData {
            order: Some(json!("created_at asc")),
            limit: page.limit,
            offset: page.offset,
            ..Default::default()
        })?
        .select_all()
        .await?;

    Ok(ApiResponse::success(json!({
        "patients": patients,
        "count": patients.len(),
        "limit": page.limit,
        "offset": page.offset,
    })))
}

/// GET /api/patients/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiResponse<Patient>, ApiError> {
    let filter = FilterData {
        where_clause: Some(json!({ "id": id.to_string() })),
        ..Default::default()
    };
    let patient = state.db.repository::<Patient>().select_404(filter).await?;

    Ok(ApiResponse::success(patient))
}

/// POST /api/patients - the new row is owned by the caller's tenant
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreatePatient>,
) -> Result<ApiResponse<Patient>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Patient name is required"));
    }

    let tenant_id = TenantContext::get().ok_or_else(|| ApiError::forbidden("Access denied"))?;

    let mut patient = Patient::new(tenant_id, body.name.trim());
    if let Some(dob) = body.date_of_birth {
        patient = patient.with_date_of_birth(dob);
    }

    let created = state.db.repository::<Patient>().insert_scoped(&patient).await?;
    tracing::info!(patient_id = %created.id, %tenant_id, "Patient created");

    Ok(ApiResponse::created(created))
}
