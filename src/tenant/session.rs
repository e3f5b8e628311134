//! Binding of the tenant context to exactly one request or background job.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use super::context::{ContextSnapshot, TenantContext};
use super::id::TenantId;

/// Identity resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub is_platform_admin: bool,
}

impl Principal {
    pub fn tenant_user(principal_id: Uuid, tenant_id: TenantId) -> Self {
        Self {
            principal_id,
            tenant_id: Some(tenant_id),
            is_platform_admin: false,
        }
    }

    /// Identity used by background jobs acting for one tenant.
    pub fn service(tenant_id: TenantId) -> Self {
        Self {
            principal_id: Uuid::nil(),
            tenant_id: Some(tenant_id),
            is_platform_admin: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unit of work timed out after {0:?}")]
    Timeout(Duration),
}

pub struct SessionBoundary;

impl SessionBoundary {
    /// Run `fut` as one unit of work for `principal`.
    ///
    /// The context is set before `fut` is first polled and cleared when the
    /// unit of work ends, whether it completes, fails, or is dropped.
    pub async fn run<F: Future>(principal: &Principal, fut: F) -> F::Output {
        let principal_id = principal.principal_id;
        let tenant_id = principal.tenant_id;
        let initial = ContextSnapshot {
            tenant_id,
            bypass: false,
        };
        TenantContext::scope_with(initial, async move {
            let _teardown = Teardown { principal_id };
            debug!(%principal_id, tenant = ?tenant_id, "Unit of work started");
            fut.await
        })
        .await
    }

    /// [`SessionBoundary::run`] with a deadline. On timeout the unit of work is dropped and its context torn down.
    pub async fn run_with_timeout<F: Future>(
        principal: &Principal,
        timeout: Duration,
        fut: F,
    ) -> Result<F::Output, SessionError> {
        Self::run(principal, tokio::time::timeout(timeout, fut))
            .await
            .map_err(|_| SessionError::Timeout(timeout))
    }

    /// Spawn `fut` on the runtime as its own unit of work.
    pub fn spawn<F>(principal: Principal, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(async move { Self::run(&principal, fut).await })
    }
}

struct Teardown {
    principal_id: Uuid,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        TenantContext::clear();
        debug!(principal_id = %self.principal_id, "Unit of work ended, tenant context cleared");
    }
}

/// Runs background work one tenant at a time, each in a fresh unit of work.
pub struct JobRunner;

impl JobRunner {
    pub async fn run_per_tenant<I, F, Fut, T>(tenants: I, mut job: F) -> Vec<T>
    where
        I: IntoIterator<Item = TenantId>,
        F: FnMut(TenantId) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut results = Vec::new();
        for tenant_id in tenants {
            let principal = Principal::service(tenant_id);
            results.push(SessionBoundary::run(&principal, job(tenant_id)).await);
        }
        results
    }
}
