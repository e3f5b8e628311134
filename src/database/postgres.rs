use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Row};
use tracing::debug;

use super::manager::DatabaseError;
use super::storage::Storage;
use crate::filter::{is_valid_identifier, Filter, SqlResult};

/// Postgres-backed storage. Rows travel as JSONB so one code path serves every entity type.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn log(sql: &SqlResult) {
        if crate::config::CONFIG.database.enable_query_logging {
            debug!(query = %sql.query, params = sql.params.len(), "Executing SQL");
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch_all(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        let select = format!("to_jsonb(\"{}\".*) AS row", filter.table_name());
        let sql = filter.to_select_sql(&select)?;
        Self::log(&sql);

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }

    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        let sql = filter.to_count_sql()?;
        Self::log(&sql);

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DatabaseError> {
        if !is_valid_identifier(table) {
            return Err(DatabaseError::QueryError(format!("Invalid table name: {}", table)));
        }
        let query = format!(
            "INSERT INTO \"{table}\" SELECT * FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING to_jsonb(\"{table}\".*) AS row"
        );
        let stored = sqlx::query(&query).bind(row).fetch_one(&self.pool).await?;
        Ok(stored.try_get::<Value, _>("row")?)
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays are expanded into one parameter per element by FilterWhere
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
