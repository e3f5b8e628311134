use serde_json::Value;

use super::error::FilterError;
use super::filter::is_valid_identifier;
use super::predicate::Predicate;
use super::types::FilterOp;

/// Translates caller WHERE documents into [`Predicate`] trees and renders
/// trees to parameterized SQL.
pub struct FilterWhere {
    param_values: Vec<Value>,
}

impl FilterWhere {
    pub fn new() -> Self {
        Self { param_values: vec![] }
    }

    /// Parse `{ "field": value, "field": { "$op": data }, "$and": [...], ... }`.
    pub fn parse(where_data: &Value) -> Result<Option<Predicate>, FilterError> {
        let max_depth = crate::config::CONFIG.filter.max_nested_depth;
        Self::parse_at(where_data, 0, max_depth)
    }

    pub fn generate(predicate: &Predicate) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new();
        let sql = filter_where.build_sql(predicate)?;
        Ok((sql, filter_where.param_values))
    }

    fn parse_at(where_data: &Value, depth: u32, max_depth: u32) -> Result<Option<Predicate>, FilterError> {
        if depth > max_depth {
            return Err(FilterError::TooDeep(max_depth));
        }
        match where_data {
            Value::Null => Ok(None),
            Value::Object(obj) => {
                let mut conditions = vec![];
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(Self::parse_logical_operator(key, value, depth, max_depth)?);
                    } else {
                        conditions.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(match conditions.len() {
                    0 => None,
                    1 => conditions.pop(),
                    _ => Some(Predicate::And(conditions)),
                })
            }
            Value::String(_) => Err(FilterError::InvalidWhereClause(
                "Raw SQL predicates are not accepted".to_string(),
            )),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value, depth: u32, max_depth: u32) -> Result<Predicate, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut parts = Vec::new();
                for v in arr {
                    if let Some(p) = Self::parse_at(v, depth + 1, max_depth)? {
                        parts.push(p);
                    }
                }
                if parts.is_empty() {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires at least one condition", op)));
                }
                Ok(if op == "$and" { Predicate::And(parts) } else { Predicate::Or(parts) })
            }
            "$not" => {
                let inner = Self::parse_at(value, depth + 1, max_depth)?
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires a condition".to_string()))?;
                Ok(Predicate::Not(Box::new(inner)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Predicate>, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        match value {
            Value::Object(obj) => obj
                .iter()
                .map(|(op_key, op_val)| -> Result<Predicate, FilterError> {
                    let op = Self::map_operator(op_key)?;
                    Self::validate_operator_data(op, op_val)?;
                    Ok(Predicate::Condition { column: field.to_string(), op, data: op_val.clone() })
                })
                .collect(),
            // Implicit equality: { field: value }
            _ => Ok(vec![Predicate::eq(field, value.clone())]),
        }
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn validate_operator_data(op: FilterOp, data: &Value) -> Result<(), FilterError> {
        match (op, data) {
            (FilterOp::Between, Value::Array(values)) if values.len() == 2 => Ok(()),
            (FilterOp::Between, _) => Err(FilterError::InvalidOperatorData(
                "$between requires exactly 2 values".to_string(),
            )),
            (FilterOp::Like | FilterOp::ILike, Value::String(_)) => Ok(()),
            (FilterOp::Like | FilterOp::ILike, _) => Err(FilterError::InvalidOperatorData(
                "$like requires a string pattern".to_string(),
            )),
            (_, Value::Object(_)) => Err(FilterError::InvalidOperatorData(format!(
                "{:?} does not accept an object",
                op
            ))),
            _ => Ok(()),
        }
    }

    fn build_sql(&mut self, predicate: &Predicate) -> Result<String, FilterError> {
        match predicate {
            Predicate::And(children) | Predicate::Or(children) if children.is_empty() => {
                Ok(if matches!(predicate, Predicate::And(_)) { "1=1" } else { "1=0" }.to_string())
            }
            Predicate::And(children) => self.join(children, " AND "),
            Predicate::Or(children) => self.join(children, " OR "),
            Predicate::Not(inner) => Ok(format!("NOT ({})", self.build_sql(inner)?)),
            Predicate::Tenant { column, tenant_id } => {
                let param = self.param(Value::String(tenant_id.to_string()));
                Ok(format!("\"{}\" = {}::uuid", column, param))
            }
            Predicate::Condition { column, op, data } => self.build_condition(column, *op, data),
        }
    }

    fn join(&mut self, children: &[Predicate], joiner: &str) -> Result<String, FilterError> {
        let parts = children
            .iter()
            .map(|child| self.build_sql(child).map(|sql| format!("({})", sql)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(joiner))
    }

    fn build_condition(&mut self, column: &str, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        // String operands bind as TEXT; compare uuid/date/timestamp columns in their text form.
        let textual = match data {
            Value::String(_) => true,
            Value::Array(values) => values.iter().any(Value::is_string),
            _ => false,
        };
        let quoted_column = if textual {
            format!("\"{}\"::text", column)
        } else {
            format!("\"{}\"", column)
        };
        Ok(match op {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Ne if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(data.clone())),
            FilterOp::Ne => format!("{} <> {}", quoted_column, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if op == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if op == FilterOp::In { "IN" } else { "NOT IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                ),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

impl Default for FilterWhere {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantId;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_operators() {
        let p = FilterWhere::parse(&json!({ "name": "Ada", "age": { "$gte": 18 } }))
            .unwrap()
            .unwrap();
        let (sql, params) = FilterWhere::generate(&p).unwrap();
        assert_eq!(sql, "(\"age\" >= $1) AND (\"name\"::text = $2)");
        assert_eq!(params, vec![json!(18), json!("Ada")]);
    }

    #[test]
    fn logical_operators_nest() {
        let p = FilterWhere::parse(&json!({
            "$or": [{ "name": "Ada" }, { "$not": { "name": { "$like": "B%" } } }]
        }))
        .unwrap()
        .unwrap();
        let (sql, params) = FilterWhere::generate(&p).unwrap();
        assert_eq!(sql, "(\"name\"::text = $1) OR (NOT (\"name\"::text LIKE $2))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn tenant_node_renders_as_uuid_parameter() {
        let tenant = TenantId::random();
        let (sql, params) = FilterWhere::generate(&Predicate::tenant("tenant_id", tenant)).unwrap();
        assert_eq!(sql, "\"tenant_id\" = $1::uuid");
        assert_eq!(params, vec![json!(tenant.to_string())]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let p = FilterWhere::parse(&json!({ "id": { "$in": [] } })).unwrap().unwrap();
        assert_eq!(FilterWhere::generate(&p).unwrap().0, "1=0");
    }

    #[test]
    fn rejects_raw_sql_and_bad_columns() {
        assert!(matches!(
            FilterWhere::parse(&json!("tenant_id = tenant_id")),
            Err(FilterError::InvalidWhereClause(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "name\" OR 1=1 --": "x" })),
            Err(FilterError::InvalidColumn(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "name": { "$regex": "x" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut doc = json!({ "name": "x" });
        for _ in 0..64 {
            doc = json!({ "$not": doc });
        }
        assert!(matches!(FilterWhere::parse(&doc), Err(FilterError::TooDeep(_))));
    }
}
