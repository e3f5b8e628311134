//! Row-level tenant isolation.
//!
//! A request or job runs as a unit of work ([`SessionBoundary`]) carrying an
//! ambient [`TenantContext`]. Reads of entities registered as scoped in the
//! [`ScopedEntityRegistry`] are restricted to the ambient tenant by the
//! [`QueryInterceptor`] when they are executed, unless a [`BypassScope`] is
//! open.

pub mod bypass;
pub mod context;
pub mod error;
pub mod id;
pub mod interceptor;
pub mod registry;
pub mod session;

pub use bypass::{BypassGuard, BypassScope};
pub use context::{ContextSnapshot, TenantContext};
pub use error::TenancyError;
pub use id::TenantId;
pub use interceptor::{FilterDecision, QueryInterceptor, RecordedDecision};
pub use registry::{Entity, EntityDescriptor, EntityScope, ScopedEntity, ScopedEntityRegistry};
pub use session::{JobRunner, Principal, SessionBoundary, SessionError};
