use std::collections::BTreeSet;

use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::predicate::Predicate;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

/// A pending read query against one table.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    where_data: Option<Predicate>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)));
        }
        Ok(Self {
            table_name,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        match (data.limit, data.offset) {
            (Some(limit), offset) => { self.limit(limit, offset)?; }
            (None, Some(offset)) => { self.offset(offset)?; }
            (None, None) => {}
        }
        Ok(self)
    }

    /// Replace the WHERE tree with one parsed from a caller document.
    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        self.where_data = FilterWhere::parse(&conditions)?;
        Ok(self)
    }

    /// AND `predicate` into the existing WHERE tree.
    pub fn and_where(&mut self, predicate: Predicate) -> &mut Self {
        self.where_data = Some(match self.where_data.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Copy of this filter with `predicate` ANDed in; `self` is left untouched.
    pub fn with_predicate(&self, predicate: Predicate) -> Filter {
        let mut filter = self.clone();
        filter.and_where(predicate);
        filter
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        let order_info = FilterOrder::validate_and_parse(&order_spec)?;
        self.order_data = order_info;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { self.offset(off)?; }

        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        Ok(self)
    }

    pub fn offset(&mut self, offset: i32) -> Result<&mut Self, FilterError> {
        if offset < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); }
        self.offset = Some(offset);
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.where_data.as_ref()
    }

    pub fn order_info(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i32> {
        self.offset
    }

    /// Whether a row-limiting clause is present. Has no bearing on tenant filtering.
    pub fn has_row_limit(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// See [`Predicate::pinned_values`].
    pub fn pinned_values(&self, column: &str) -> Option<BTreeSet<String>> {
        self.where_data.as_ref().and_then(|p| p.pinned_values(column))
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.where_data.as_ref().map_or(true, |p| p.matches(row))
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        self.to_select_sql("*")
    }

    /// Full SELECT with a caller-chosen select list, e.g. a row-to-JSON expression.
    pub fn to_select_sql(&self, select_clause: &str) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = match &self.where_data {
            Some(predicate) => FilterWhere::generate(predicate)?,
            None => (String::new(), vec![]),
        };
        Ok(SqlResult { query, params })
    }

    /// COUNT over exactly the rows a SELECT would return, pagination included.
    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        if self.has_row_limit() {
            let page = self.to_select_sql("1")?;
            return Ok(SqlResult {
                query: format!("SELECT COUNT(*) AS count FROM ({}) AS page", page.query),
                params: page.params,
            });
        }
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

/// Table and column names: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
