use axum::{
    middleware,
    routing::get,
    Router,
};
use sqlx::PgPool;

use crate::database::Database;
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, tenant_session_middleware, validate_tenant_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Present when running against Postgres; used by the health check.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db, pool: None }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Full router: public routes plus the authenticated `/api` tree.
///
/// Layers run outermost first: JWT auth, tenant validation, then the
/// per-request unit of work that carries the tenant context.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes(state.clone()))
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    use handlers::{admin, devices, patients};

    Router::new()
        .route("/api/patients", get(patients::list).post(patients::create))
        .route("/api/patients/:id", get(patients::get))
        .route("/api/devices", get(devices::list))
        .route("/api/admin/patients", get(admin::patients))
        .layer(middleware::from_fn(tenant_session_middleware))
        .layer(middleware::from_fn_with_state(state, validate_tenant_middleware))
        .layer(middleware::from_fn(jwt_auth_middleware))
}
