//! Tenant predicate injection at read-query finalization.

use tracing::{debug, error, warn};

use super::context::ContextSnapshot;
use super::error::TenancyError;
use super::id::TenantId;
use super::registry::EntityDescriptor;
use crate::config::{config, MissingContextPolicy};
use crate::filter::{Filter, Predicate};

/// Outcome of the filtering decision for one prepared query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Entity is not tenant-scoped.
    Unscoped,
    /// A bypass scope was active.
    Bypassed,
    /// The caller already restricted the tenant column to the ambient tenant.
    ExplicitFilter { tenant_id: TenantId },
    /// The ambient tenant predicate was added.
    Injected { tenant_id: TenantId },
    /// No tenant context: the query yields nothing.
    Denied,
}

/// A decision plus the context it was made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedDecision {
    pub decision: FilterDecision,
    pub snapshot: ContextSnapshot,
}

pub struct QueryInterceptor {
    policy: MissingContextPolicy,
}

impl QueryInterceptor {
    pub fn new(policy: MissingContextPolicy) -> Self {
        Self { policy }
    }

    /// Decide how `filter` must be restricted under `snapshot`.
    ///
    /// Order: bypass, unscoped entity, explicit tenant filter, injection,
    /// fail-closed. Pagination never influences the outcome.
    pub fn decide(
        &self,
        descriptor: &EntityDescriptor,
        filter: &Filter,
        snapshot: ContextSnapshot,
    ) -> Result<FilterDecision, TenancyError> {
        if snapshot.bypass {
            debug!(table = descriptor.table, "Tenant filter skipped: bypass active");
            return Ok(FilterDecision::Bypassed);
        }

        let Some(column) = descriptor.tenant_column() else {
            return Ok(FilterDecision::Unscoped);
        };

        if let Some(pinned) = filter.pinned_values(column) {
            let Some(tenant_id) = snapshot.tenant_id else {
                return self.missing_context(descriptor);
            };
            // Any spelling of the ambient id counts; values that are not tenant ids never match.
            let matches_ambient = |value: &String| value.parse::<TenantId>().map_or(false, |id| id == tenant_id);
            if pinned.iter().all(matches_ambient) {
                debug!(table = descriptor.table, %tenant_id, "Explicit tenant filter kept");
                return Ok(FilterDecision::ExplicitFilter { tenant_id });
            }
            warn!(
                table = descriptor.table,
                %tenant_id,
                requested = ?pinned,
                "Rejected tenant filter naming another tenant"
            );
            return Err(TenancyError::TenantMismatch {
                table: descriptor.table.to_string(),
            });
        }

        match snapshot.tenant_id {
            Some(tenant_id) => {
                if config().tenancy.debug_logging {
                    debug!(
                        table = descriptor.table,
                        %tenant_id,
                        paginated = filter.has_row_limit(),
                        "Tenant filter injected"
                    );
                }
                Ok(FilterDecision::Injected { tenant_id })
            }
            None => self.missing_context(descriptor),
        }
    }

    /// The filter to execute for `decision`, or `None` when nothing may be returned.
    pub fn apply(decision: FilterDecision, descriptor: &EntityDescriptor, filter: &Filter) -> Option<Filter> {
        match (decision, descriptor.tenant_column()) {
            (FilterDecision::Denied, _) => None,
            (FilterDecision::Injected { tenant_id }, Some(column)) => {
                Some(filter.with_predicate(Predicate::tenant(column, tenant_id)))
            }
            // A scoped entity must never reach storage unrestricted by mistake.
            (FilterDecision::Injected { .. }, None) => None,
            _ => Some(filter.clone()),
        }
    }

    fn missing_context(&self, descriptor: &EntityDescriptor) -> Result<FilterDecision, TenancyError> {
        error!(table = descriptor.table, "Scoped query without tenant context");
        match self.policy {
            MissingContextPolicy::Reject => Err(TenancyError::ContextMissing {
                table: descriptor.table.to_string(),
            }),
            MissingContextPolicy::Empty => Ok(FilterDecision::Denied),
        }
    }
}
