//! Narrow escape hatch from automatic tenant filtering.
//!
//! Used for the pre-authentication identity lookup, the platform-admin
//! console and maintenance jobs. Keep the guarded block to the statements
//! that actually need cross-tenant access.

use std::future::Future;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use tracing::warn;

use super::context::{ContextSnapshot, TenantContext};
use super::error::TenancyError;
use crate::config::config;

pub struct BypassScope;

impl BypassScope {
    /// Run `fut` with filtering suspended for the current unit of work.
    ///
    /// The bypass lives in a nested task-local scope that inherits the
    /// enclosing tenant id. Leaving the block by any route, including the
    /// future being dropped, returns to the enclosing state.
    pub async fn run<F: Future>(reason: &'static str, fut: F) -> F::Output {
        let enclosing = TenantContext::snapshot();
        let _audit = BypassAudit::enter(reason);
        TenantContext::scope_with(
            ContextSnapshot {
                bypass: true,
                ..enclosing
            },
            fut,
        )
        .await
    }

    /// Like [`BypassScope::run`], but reports a block held open longer than `limit`.
    pub async fn run_checked<F: Future>(
        reason: &'static str,
        limit: Duration,
        fut: F,
    ) -> Result<F::Output, TenancyError> {
        let started = Instant::now();
        let output = Self::run(reason, fut).await;
        let elapsed = started.elapsed();
        if elapsed > limit {
            return Err(TenancyError::BypassMisuse {
                reason: reason.to_string(),
                elapsed_ms: elapsed.as_millis(),
                limit_ms: limit.as_millis(),
            });
        }
        Ok(output)
    }
}

/// Synchronous form of the bypass scope.
///
/// Closes its level of bypass when dropped; guards may be dropped in any
/// order. Not `Send`, so it cannot be moved to another task or thread.
pub struct BypassGuard {
    _audit: BypassAudit,
    _not_send: PhantomData<*const ()>,
}

impl BypassGuard {
    pub fn enter(reason: &'static str) -> Result<Self, TenancyError> {
        TenantContext::enter_bypass()?;
        Ok(Self {
            _audit: BypassAudit::enter(reason),
            _not_send: PhantomData,
        })
    }
}

impl Drop for BypassGuard {
    fn drop(&mut self) {
        TenantContext::exit_bypass();
    }
}

struct BypassAudit {
    reason: &'static str,
    started: Instant,
}

impl BypassAudit {
    fn enter(reason: &'static str) -> Self {
        if config().tenancy.audit_bypass {
            warn!(
                reason,
                tenant = ?TenantContext::get(),
                "Tenant filtering bypass opened"
            );
        }
        Self {
            reason,
            started: Instant::now(),
        }
    }
}

impl Drop for BypassAudit {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let threshold = Duration::from_millis(config().tenancy.bypass_warn_after_ms);
        if elapsed > threshold {
            warn!(
                reason = self.reason,
                elapsed_ms = elapsed.as_millis() as u64,
                "Tenant filtering bypass held longer than expected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantId;

    #[tokio::test]
    async fn run_restores_enclosing_state() {
        let tenant = TenantId::random();
        TenantContext::scope(async move {
            TenantContext::set(tenant).unwrap();
            let inside = BypassScope::run("test", async { TenantContext::snapshot() }).await;
            assert!(inside.bypass);
            assert_eq!(inside.tenant_id, Some(tenant));
            assert_eq!(TenantContext::snapshot(), ContextSnapshot::for_tenant(tenant));
        })
        .await;
    }

    #[tokio::test]
    async fn run_restores_after_error() {
        TenantContext::scope(async {
            let result: Result<(), &str> = BypassScope::run("test", async { Err("boom") }).await;
            assert!(result.is_err());
            assert!(!TenantContext::is_bypassed());
        })
        .await;
    }

    #[tokio::test]
    async fn run_restores_after_cancellation() {
        TenantContext::scope(async {
            let pending = BypassScope::run("test", futures::future::pending::<()>());
            let timed_out = tokio::time::timeout(Duration::from_millis(5), pending).await;
            assert!(timed_out.is_err());
            assert!(!TenantContext::is_bypassed());
        })
        .await;
    }

    #[tokio::test]
    async fn run_checked_reports_overlong_block() {
        let err = BypassScope::run_checked("slow job", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TenancyError::BypassMisuse { ref reason, .. } if reason == "slow job"));
    }

    #[test]
    fn nested_guards_restore_enclosing_flag() {
        TenantContext::sync_scope(|| {
            let outer = BypassGuard::enter("outer").unwrap();
            {
                let _inner = BypassGuard::enter("inner").unwrap();
                assert!(TenantContext::is_bypassed());
            }
            assert!(TenantContext::is_bypassed());
            drop(outer);
            assert!(!TenantContext::is_bypassed());
        });
    }

    #[test]
    fn guards_dropped_out_of_order_still_close() {
        TenantContext::sync_scope(|| {
            let outer = BypassGuard::enter("outer").unwrap();
            let inner = BypassGuard::enter("inner").unwrap();
            drop(outer);
            assert!(TenantContext::is_bypassed());
            drop(inner);
            assert!(!TenantContext::is_bypassed());
        });
    }

    #[tokio::test]
    async fn guard_inside_scope_closes_with_it() {
        TenantContext::scope(async {
            BypassScope::run("outer", async {
                let guard = BypassGuard::enter("inner").unwrap();
                assert!(TenantContext::is_bypassed());
                drop(guard);
                assert!(TenantContext::is_bypassed());
            })
            .await;
            assert!(!TenantContext::is_bypassed());
        })
        .await;
    }

    #[test]
    fn guard_restores_on_panic() {
        TenantContext::sync_scope(|| {
            let result = std::panic::catch_unwind(|| {
                let _guard = BypassGuard::enter("panicking").unwrap();
                panic!("boom");
            });
            assert!(result.is_err());
            assert!(!TenantContext::is_bypassed());
        });
    }

    #[test]
    fn guard_requires_unit_of_work() {
        assert!(matches!(BypassGuard::enter("nowhere"), Err(TenancyError::NoUnitOfWork)));
    }
}
