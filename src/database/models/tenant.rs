use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::{Entity, TenantId};

/// Customer organization. Created and retired by the provisioning workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Trial,
    Suspended,
    Cancelled,
}

impl TenantStatus {
    /// Whether users of the tenant may sign in and work.
    pub fn is_operational(&self) -> bool {
        matches!(self, TenantStatus::Active | TenantStatus::Trial)
    }
}

impl Tenant {
    pub fn new(name: impl Into<String>, status: TenantStatus) -> Self {
        Self {
            id: TenantId::random(),
            name: name.into(),
            status,
            created_at: Utc::now(),
        }
    }
}

// The tenant table itself is never tenant-filtered.
impl Entity for Tenant {
    const TABLE: &'static str = "tenants";
}
