use axum::extract::{Query, State};
use serde_json::{json, Value};

use super::PageQuery;
use crate::app::AppState;
use crate::database::models::Device;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::ApiResponse;

/// GET /api/devices
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let filter = FilterData {
        order: Some(json!("serial_number")),
        limit: page.limit,
        offset: page.offset,
        ..Default::default()
    };
    let devices = state.db.repository::<Device>().select_any(filter).await?;

    Ok(ApiResponse::success(json!({ "devices": devices, "count": devices.len() })))
}
