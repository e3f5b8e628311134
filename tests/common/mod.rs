#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tenant_isolation::database::manager::DatabaseError;
use tenant_isolation::database::models::{self, Device, Patient, Tenant, TenantStatus};
use tenant_isolation::database::{Database, MemoryStorage};
use tenant_isolation::tenant::{Principal, SessionBoundary, TenancyError, TenantId};

/// In-memory database seeded with two operational tenants and one suspended one.
pub struct Fixture {
    pub db: Database,
    pub storage: MemoryStorage,
    pub acme: Tenant,
    pub globex: Tenant,
    pub suspended: Tenant,
}

impl Fixture {
    pub async fn new() -> Result<Self> {
        let storage = MemoryStorage::new();
        let db = Database::new(Arc::new(storage.clone()), models::registry()?);

        let acme = db.insert(&Tenant::new("Acme Hearing", TenantStatus::Active)).await?;
        let globex = db.insert(&Tenant::new("Globex Audiology", TenantStatus::Trial)).await?;
        let suspended = db.insert(&Tenant::new("Initech Clinics", TenantStatus::Suspended)).await?;

        Ok(Self { db, storage, acme, globex, suspended })
    }

    /// Fixture with `acme_patients` and `globex_patients` rows in the two tenants.
    pub async fn seeded(acme_patients: usize, globex_patients: usize) -> Result<Self> {
        let fixture = Self::new().await?;
        fixture.seed_patients(fixture.acme.id, acme_patients).await?;
        fixture.seed_patients(fixture.globex.id, globex_patients).await?;
        Ok(fixture)
    }

    pub async fn seed_patients(&self, tenant_id: TenantId, count: usize) -> Result<Vec<Patient>> {
        let db = self.db.clone();
        let rows = SessionBoundary::run(&Principal::service(tenant_id), async move {
            let mut rows = Vec::with_capacity(count);
            for i in 0..count {
                rows.push(db.insert_scoped(&Patient::new(tenant_id, format!("Patient {:03}", i))).await?);
            }
            Ok::<_, DatabaseError>(rows)
        })
        .await?;
        Ok(rows)
    }

    pub async fn seed_devices(&self, tenant_id: TenantId, count: usize) -> Result<Vec<Device>> {
        let db = self.db.clone();
        let rows = SessionBoundary::run(&Principal::service(tenant_id), async move {
            let mut rows = Vec::with_capacity(count);
            for i in 0..count {
                rows.push(db.insert_scoped(&Device::new(tenant_id, format!("SN-{:05}", i), "Aurora 2")).await?);
            }
            Ok::<_, DatabaseError>(rows)
        })
        .await?;
        Ok(rows)
    }
}

/// Unwraps the tenancy error inside a `DatabaseError`, if that is what it is.
pub fn tenancy_error(err: &DatabaseError) -> Option<&TenancyError> {
    match err {
        DatabaseError::Tenancy(e) => Some(e),
        _ => None,
    }
}
