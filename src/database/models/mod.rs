pub mod device;
pub mod patient;
pub mod setting;
pub mod tenant;

pub use device::Device;
pub use patient::Patient;
pub use setting::PlatformSetting;
pub use tenant::{Tenant, TenantStatus};

use crate::tenant::{ScopedEntityRegistry, TenancyError};

/// Registry with every entity type this service persists.
pub fn registry() -> Result<ScopedEntityRegistry, TenancyError> {
    let mut registry = ScopedEntityRegistry::new();
    registry
        .register_global::<Tenant>()?
        .register_global::<PlatformSetting>()?
        .register_scoped::<Patient>()?
        .register_scoped::<Device>()?;
    Ok(registry)
}
