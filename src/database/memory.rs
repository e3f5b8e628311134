use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::manager::DatabaseError;
use super::storage::Storage;
use crate::filter::predicate::compare_values;
use crate::filter::{is_valid_identifier, Filter, SortDirection};

/// In-process storage evaluating the same predicate trees as the SQL path.
///
/// Yields to the scheduler between rows so concurrently running units of
/// work interleave the way they would on a real connection pool.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows in `table`, ignoring every filter. For test assertions.
    pub async fn raw_len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }

    async fn select(&self, filter: &Filter) -> Vec<Value> {
        let rows = self
            .tables
            .read()
            .await
            .get(filter.table_name())
            .cloned()
            .unwrap_or_default();

        let mut matched = Vec::new();
        for row in rows {
            tokio::task::yield_now().await;
            if filter.matches(&row) {
                matched.push(row);
            }
        }

        if !filter.order_info().is_empty() {
            matched.sort_by(|a, b| {
                for info in filter.order_info() {
                    let left = a.get(&info.column).unwrap_or(&Value::Null);
                    let right = b.get(&info.column).unwrap_or(&Value::Null);
                    let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
                    let ord = match info.sort {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let limit = filter.limit_value().map_or(usize::MAX, |l| l.max(0) as usize);
        matched.into_iter().skip(offset).take(limit).collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_all(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        Ok(self.select(filter).await)
    }

    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        Ok(self.select(filter).await.len() as i64)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DatabaseError> {
        if !is_valid_identifier(table) {
            return Err(DatabaseError::QueryError(format!("Invalid table name: {}", table)));
        }
        if !row.is_object() {
            return Err(DatabaseError::QueryError("Rows must be JSON objects".to_string()));
        }
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}
