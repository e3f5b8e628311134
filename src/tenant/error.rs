use thiserror::Error;

/// Failures raised by the tenant isolation layer.
///
/// None of these are shown to API clients verbatim; `ApiError` maps them to
/// generic forbidden / internal responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenancyError {
    /// Entity declaration problem, surfaced at registration time.
    #[error("Tenancy configuration error: {0}")]
    Configuration(String),

    /// A scoped query ran with no ambient tenant and no bypass.
    #[error("No tenant context for scoped query on '{table}'")]
    ContextMissing { table: String },

    /// A caller-supplied tenant filter (or a written row) names a tenant other than the ambient one.
    #[error("Tenant filter on '{table}' does not match the active tenant")]
    TenantMismatch { table: String },

    /// A prepared query was re-executed under a different tenant context than it was filtered for.
    #[error("Tenant context changed since the query on '{table}' was prepared")]
    ContextChanged { table: String },

    #[error("Bypass scope '{reason}' was held for {elapsed_ms}ms (limit {limit_ms}ms)")]
    BypassMisuse {
        reason: String,
        elapsed_ms: u128,
        limit_ms: u128,
    },

    /// `TenantContext::set` was called outside of any unit of work.
    #[error("No unit of work is active on this task")]
    NoUnitOfWork,
}
