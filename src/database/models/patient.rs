use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::{Entity, ScopedEntity, TenantId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// New patient owned by `tenant_id`.
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            date_of_birth: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }
}

impl Entity for Patient {
    const TABLE: &'static str = "patients";
}

impl ScopedEntity for Patient {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
