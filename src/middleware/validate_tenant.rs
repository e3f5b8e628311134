use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::Tenant;
use crate::error::ApiError;

/// The caller's tenant, looked up and found operational
#[derive(Clone, Debug)]
pub struct ValidatedTenant(pub Tenant);

/// Middleware that checks the tenant named in the JWT exists and may work.
///
/// Suspended and cancelled tenants are refused here, before any scoped data
/// is touched. Platform admins without a tenant pass through.
pub async fn validate_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant validation"))?;

    let Some(tenant_id) = auth_user.tenant_id else {
        if auth_user.is_platform_admin {
            return Ok(next.run(request).await);
        }
        tracing::warn!(principal_id = %auth_user.principal_id, "Token carries no tenant");
        return Err(ApiError::forbidden("No tenant associated with this account"));
    };

    let tenant = state.db.find_tenant(tenant_id).await?.ok_or_else(|| {
        tracing::warn!(%tenant_id, "Tenant validation failed: tenant not found");
        ApiError::forbidden("Tenant is not active or does not exist")
    })?;

    if !tenant.status.is_operational() {
        tracing::warn!(%tenant_id, status = ?tenant.status, "Tenant validation failed: tenant not operational");
        return Err(ApiError::forbidden("Tenant is not active or does not exist"));
    }

    tracing::debug!("Tenant validation successful: {} ({})", tenant.name, tenant.id);
    request.extensions_mut().insert(ValidatedTenant(tenant));

    Ok(next.run(request).await)
}
