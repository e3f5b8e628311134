//! Declaration of which entity types take part in tenant isolation.
//!
//! Participation is nominal: only a type implementing [`ScopedEntity`] can be
//! registered as scoped, and lookups go by `TypeId`. A global type that
//! happens to carry a column named like a tenant owner is never filtered.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::TenancyError;
use super::id::TenantId;
use crate::filter::is_valid_identifier;

/// A persisted record type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
}

/// Capability of a record owned by exactly one tenant.
pub trait ScopedEntity: Entity {
    const TENANT_COLUMN: &'static str = "tenant_id";

    fn tenant_id(&self) -> TenantId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityScope {
    Global,
    Tenant { column: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub table: &'static str,
    pub scope: EntityScope,
}

impl EntityDescriptor {
    pub fn tenant_column(&self) -> Option<&'static str> {
        match self.scope {
            EntityScope::Tenant { column } => Some(column),
            EntityScope::Global => None,
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.tenant_column().is_some()
    }
}

/// Registry built once at startup and shared read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct ScopedEntityRegistry {
    entries: HashMap<TypeId, EntityDescriptor>,
}

impl ScopedEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_scoped<E: ScopedEntity>(&mut self) -> Result<&mut Self, TenancyError> {
        if !is_valid_identifier(E::TENANT_COLUMN) {
            return Err(TenancyError::Configuration(format!(
                "{} declares an unusable tenant column '{}'",
                type_name::<E>(),
                E::TENANT_COLUMN
            )));
        }
        self.insert::<E>(EntityScope::Tenant {
            column: E::TENANT_COLUMN,
        })
    }

    pub fn register_global<E: Entity>(&mut self) -> Result<&mut Self, TenancyError> {
        self.insert::<E>(EntityScope::Global)
    }

    /// Descriptor for `E`. Unregistered types are a configuration error, never "global".
    pub fn descriptor<E: Entity>(&self) -> Result<&EntityDescriptor, TenancyError> {
        self.entries.get(&TypeId::of::<E>()).ok_or_else(|| {
            TenancyError::Configuration(format!(
                "{} is not registered with the entity registry",
                type_name::<E>()
            ))
        })
    }

    pub fn is_scoped<E: Entity>(&self) -> bool {
        self.descriptor::<E>().map(EntityDescriptor::is_scoped).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert<E: Entity>(&mut self, scope: EntityScope) -> Result<&mut Self, TenancyError> {
        let descriptor = EntityDescriptor {
            type_name: type_name::<E>(),
            table: E::TABLE,
            scope,
        };
        if !is_valid_identifier(descriptor.table) {
            return Err(TenancyError::Configuration(format!(
                "{} declares an invalid table name '{}'",
                descriptor.type_name, descriptor.table
            )));
        }

        if let Some(existing) = self.entries.get(&TypeId::of::<E>()) {
            if *existing == descriptor {
                return Ok(self);
            }
            return Err(TenancyError::Configuration(format!(
                "{} registered twice with different scopes",
                descriptor.type_name
            )));
        }

        // Two types over one table must agree, or the global one becomes a back door.
        if let Some(other) = self
            .entries
            .values()
            .find(|d| d.table == descriptor.table && d.scope != descriptor.scope)
        {
            return Err(TenancyError::Configuration(format!(
                "table '{}' is declared {:?} by {} but {:?} by {}",
                descriptor.table, other.scope, other.type_name, descriptor.scope, descriptor.type_name
            )));
        }

        debug!(entity = descriptor.type_name, table = descriptor.table, scope = ?descriptor.scope, "Registered entity");
        self.entries.insert(TypeId::of::<E>(), descriptor);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Invoice {
        tenant_id: TenantId,
    }

    impl Entity for Invoice {
        const TABLE: &'static str = "invoices";
    }

    impl ScopedEntity for Invoice {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }
    }

    // Same column name, but never opted in.
    #[derive(Debug, Serialize, Deserialize)]
    struct CatalogItem {
        tenant_id: Option<TenantId>,
    }

    impl Entity for CatalogItem {
        const TABLE: &'static str = "catalog_items";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct InvoiceAlias;

    impl Entity for InvoiceAlias {
        const TABLE: &'static str = "invoices";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct BadColumn {
        owner: TenantId,
    }

    impl Entity for BadColumn {
        const TABLE: &'static str = "bad_columns";
    }

    impl ScopedEntity for BadColumn {
        const TENANT_COLUMN: &'static str = "owner; --";

        fn tenant_id(&self) -> TenantId {
            self.owner
        }
    }

    #[test]
    fn scoped_and_global_are_distinguished_by_type() {
        let mut registry = ScopedEntityRegistry::new();
        registry
            .register_scoped::<Invoice>()
            .unwrap()
            .register_global::<CatalogItem>()
            .unwrap();

        assert!(registry.is_scoped::<Invoice>());
        assert!(!registry.is_scoped::<CatalogItem>());
        assert_eq!(
            registry.descriptor::<Invoice>().unwrap().tenant_column(),
            Some("tenant_id")
        );
        assert_eq!(registry.descriptor::<CatalogItem>().unwrap().tenant_column(), None);
    }

    #[test]
    fn unregistered_entity_is_a_configuration_error() {
        let registry = ScopedEntityRegistry::new();
        assert!(matches!(
            registry.descriptor::<Invoice>(),
            Err(TenancyError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_tenant_column_rejected_at_registration() {
        let mut registry = ScopedEntityRegistry::new();
        assert!(matches!(
            registry.register_scoped::<BadColumn>(),
            Err(TenancyError::Configuration(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn global_alias_of_scoped_table_rejected() {
        let mut registry = ScopedEntityRegistry::new();
        registry.register_scoped::<Invoice>().unwrap();
        assert!(registry.register_global::<InvoiceAlias>().is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_identical_registration_is_accepted() {
        let mut registry = ScopedEntityRegistry::new();
        registry.register_scoped::<Invoice>().unwrap();
        registry.register_scoped::<Invoice>().unwrap();
        assert_eq!(registry.len(), 1);
    }
}
