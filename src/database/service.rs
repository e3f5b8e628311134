use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::config::{config, MissingContextPolicy};
use crate::database::manager::DatabaseError;
use crate::database::models::Tenant;
use crate::database::query_builder::QueryBuilder;
use crate::database::repository::Repository;
use crate::database::storage::Storage;
use crate::filter::Predicate;
use crate::tenant::{Entity, ScopedEntity, ScopedEntityRegistry, TenancyError, TenantContext, TenantId};

/// Entry point for all reads and writes of registered entities.
#[derive(Clone)]
pub struct Database {
    storage: Arc<dyn Storage>,
    registry: Arc<ScopedEntityRegistry>,
    policy: MissingContextPolicy,
}

impl Database {
    pub fn new(storage: Arc<dyn Storage>, registry: ScopedEntityRegistry) -> Self {
        Self {
            storage,
            registry: Arc::new(registry),
            policy: config().tenancy.missing_context,
        }
    }

    pub fn with_missing_context_policy(mut self, policy: MissingContextPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &ScopedEntityRegistry {
        &self.registry
    }

    pub fn query<E: Entity>(&self) -> Result<QueryBuilder<E>, DatabaseError> {
        let descriptor = self.registry.descriptor::<E>()?.clone();
        QueryBuilder::new(self.storage.clone(), descriptor, self.policy)
    }

    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.clone())
    }

    /// Persist a global entity. Scoped entities go through [`Database::insert_scoped`].
    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<E, DatabaseError> {
        let descriptor = self.registry.descriptor::<E>()?;
        if descriptor.is_scoped() {
            return Err(TenancyError::Configuration(format!(
                "{} is tenant-scoped and must be written with insert_scoped",
                descriptor.type_name
            ))
            .into());
        }

        let row = serde_json::to_value(entity)?;
        let stored = self.storage.insert(descriptor.table, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Persist a tenant-scoped entity.
    ///
    /// The entity must already be owned by the ambient tenant; this checks
    /// the stamp, it does not apply it. Inside a bypass any owner is accepted.
    pub async fn insert_scoped<E: ScopedEntity>(&self, entity: &E) -> Result<E, DatabaseError> {
        let descriptor = self.registry.descriptor::<E>()?;
        let column = descriptor.tenant_column().ok_or_else(|| {
            TenancyError::Configuration(format!("{} is registered as global", descriptor.type_name))
        })?;
        let owner = entity.tenant_id();
        let row = serde_json::to_value(entity)?;

        // The stored column is what reads filter on, so it has to agree with tenant_id().
        let stored_owner = row
            .get(column)
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<TenantId>().ok());
        if stored_owner != Some(owner) {
            return Err(TenancyError::Configuration(format!(
                "{} does not serialize its owner into tenant column '{}'",
                descriptor.type_name, column
            ))
            .into());
        }

        let snapshot = TenantContext::snapshot();
        if !snapshot.bypass {
            let ambient = snapshot.tenant_id.ok_or_else(|| TenancyError::ContextMissing {
                table: descriptor.table.to_string(),
            })?;
            if owner != ambient {
                warn!(table = descriptor.table, %ambient, %owner, "Rejected write for another tenant");
                return Err(TenancyError::TenantMismatch {
                    table: descriptor.table.to_string(),
                }
                .into());
            }
        }

        let stored = self.storage.insert(descriptor.table, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Look up a tenant by id. Tenants are global, so no context is needed.
    pub async fn find_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>, DatabaseError> {
        self.query::<Tenant>()?
            .and_where(Predicate::eq("id", Value::String(tenant_id.to_string())))
            .select_optional()
            .await
    }
}
