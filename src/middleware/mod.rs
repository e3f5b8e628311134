pub mod auth;
pub mod response;
pub mod session;
pub mod validate_tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use response::ApiResponse;
pub use session::tenant_session_middleware;
pub use validate_tenant::{validate_tenant_middleware, ValidatedTenant};
