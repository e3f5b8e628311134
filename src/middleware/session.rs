use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::tenant::SessionBoundary;

/// Runs the rest of the request as one unit of work for the authenticated caller.
pub async fn tenant_session_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<AuthUser>()
        .map(AuthUser::principal)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    Ok(SessionBoundary::run(&principal, next.run(request)).await)
}
