//! Ambient tenant context, one instance per unit of work.
//!
//! The value lives in tokio task-local storage, so it travels with the task
//! across `.await` points and is never visible to other tasks interleaved on
//! the same worker thread. Tasks started with `tokio::spawn` begin with no
//! context at all and must open their own unit of work.

use std::cell::Cell;
use std::future::Future;

use super::error::TenancyError;
use super::id::TenantId;

tokio::task_local! {
    static CONTEXT: Cell<ContextState>;
}

/// Stored state. Bypass is a depth so guards may be dropped in any order.
#[derive(Debug, Clone, Copy, Default)]
struct ContextState {
    tenant_id: Option<TenantId>,
    bypass_depth: u32,
}

impl ContextState {
    fn snapshot(self) -> ContextSnapshot {
        ContextSnapshot {
            tenant_id: self.tenant_id,
            bypass: self.bypass_depth > 0,
        }
    }
}

impl From<ContextSnapshot> for ContextState {
    fn from(snapshot: ContextSnapshot) -> Self {
        Self {
            tenant_id: snapshot.tenant_id,
            bypass_depth: u32::from(snapshot.bypass),
        }
    }
}

/// Copy of the context state at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub tenant_id: Option<TenantId>,
    pub bypass: bool,
}

impl ContextSnapshot {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            bypass: false,
        }
    }
}

pub struct TenantContext;

impl TenantContext {
    /// Run `fut` as a unit of work with an empty context.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        Self::scope_with(ContextSnapshot::default(), fut).await
    }

    pub(crate) async fn scope_with<F: Future>(state: ContextSnapshot, fut: F) -> F::Output {
        CONTEXT.scope(Cell::new(state.into()), fut).await
    }

    /// Synchronous unit of work, for blocking code paths and tests.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CONTEXT.sync_scope(Cell::new(ContextState::default()), f)
    }

    /// Whether the current task is inside a unit of work.
    pub fn is_active() -> bool {
        CONTEXT.try_with(|_| ()).is_ok()
    }

    pub fn set(tenant_id: TenantId) -> Result<(), TenancyError> {
        Self::update(|state| state.tenant_id = Some(tenant_id))
    }

    pub fn get() -> Option<TenantId> {
        Self::snapshot().tenant_id
    }

    /// Reset to empty. A no-op outside of a unit of work.
    pub fn clear() {
        let _ = CONTEXT.try_with(|cell| cell.set(ContextState::default()));
    }

    pub fn is_bypassed() -> bool {
        Self::snapshot().bypass
    }

    pub fn snapshot() -> ContextSnapshot {
        CONTEXT
            .try_with(|cell| cell.get().snapshot())
            .unwrap_or_default()
    }

    /// Open one level of bypass in the current unit of work.
    pub(crate) fn enter_bypass() -> Result<(), TenancyError> {
        Self::update(|state| state.bypass_depth = state.bypass_depth.saturating_add(1))
    }

    /// Close one level of bypass. Filtering resumes once every level is closed.
    pub(crate) fn exit_bypass() {
        let _ = Self::update(|state| state.bypass_depth = state.bypass_depth.saturating_sub(1));
    }

    fn update(f: impl FnOnce(&mut ContextState)) -> Result<(), TenancyError> {
        CONTEXT
            .try_with(|cell| {
                let mut state = cell.get();
                f(&mut state);
                cell.set(state);
            })
            .map_err(|_| TenancyError::NoUnitOfWork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_outside_unit_of_work_is_none() {
        assert_eq!(TenantContext::get(), None);
        assert!(!TenantContext::is_bypassed());
        assert!(!TenantContext::is_active());
    }

    #[test]
    fn set_outside_unit_of_work_fails() {
        let err = TenantContext::set(TenantId::random()).unwrap_err();
        assert_eq!(err, TenancyError::NoUnitOfWork);
    }

    #[tokio::test]
    async fn set_get_clear_within_scope() {
        let tenant = TenantId::random();
        TenantContext::scope(async move {
            assert_eq!(TenantContext::get(), None);
            TenantContext::set(tenant).unwrap();
            assert_eq!(TenantContext::get(), Some(tenant));
            tokio::task::yield_now().await;
            assert_eq!(TenantContext::get(), Some(tenant));
            TenantContext::clear();
            assert_eq!(TenantContext::get(), None);
        })
        .await;
        assert_eq!(TenantContext::get(), None);
    }

    #[tokio::test]
    async fn spawned_task_does_not_inherit_context() {
        let tenant = TenantId::random();
        let seen = TenantContext::scope(async move {
            TenantContext::set(tenant).unwrap();
            tokio::spawn(async { TenantContext::get() }).await.unwrap()
        })
        .await;
        assert_eq!(seen, None);
    }

    #[test]
    fn sync_scope_is_isolated() {
        let tenant = TenantId::random();
        TenantContext::sync_scope(|| {
            TenantContext::set(tenant).unwrap();
            TenantContext::sync_scope(|| assert_eq!(TenantContext::get(), None));
            assert_eq!(TenantContext::get(), Some(tenant));
        });
    }
}
