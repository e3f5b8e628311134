use async_trait::async_trait;
use serde_json::Value;

use super::manager::DatabaseError;
use crate::filter::Filter;

/// Row store under the query layer.
///
/// Implementations execute the filter they are given verbatim. Tenant
/// restriction has already been folded into it by the time it arrives here,
/// so storages must never be called directly by business code.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn fetch_all(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError>;

    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, DatabaseError>;
}
