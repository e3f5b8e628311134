use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::{Entity, ScopedEntity, TenantId};

/// Hearing device held in a tenant's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub serial_number: String,
    pub model: String,
    pub patient_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn new(tenant_id: TenantId, serial_number: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            serial_number: serial_number.into(),
            model: model.into(),
            patient_id: None,
            created_at: Utc::now(),
        }
    }
}

impl Entity for Device {
    const TABLE: &'static str = "devices";
}

impl ScopedEntity for Device {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
