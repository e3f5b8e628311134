use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tenant::{Entity, TenantId};

/// Platform-wide setting.
///
/// `tenant_id` records which tenant requested the setting, for support
/// purposes only. Settings are global and are never tenant-filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSetting {
    pub key: String,
    pub value: Value,
    pub tenant_id: Option<TenantId>,
}

impl Entity for PlatformSetting {
    const TABLE: &'static str = "platform_settings";
}
