use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use super::types::FilterOp;
use crate::tenant::TenantId;

/// WHERE tree of a pending query.
///
/// Tenant restrictions added by the query interceptor are a dedicated node
/// rather than an ordinary condition, so their provenance survives all the
/// way to SQL generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition {
        column: String,
        op: FilterOp,
        data: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Tenant {
        column: String,
        tenant_id: TenantId,
    },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, data: impl Into<Value>) -> Self {
        Predicate::Condition {
            column: column.into(),
            op: FilterOp::Eq,
            data: data.into(),
        }
    }

    pub fn tenant(column: impl Into<String>, tenant_id: TenantId) -> Self {
        Predicate::Tenant {
            column: column.into(),
            tenant_id,
        }
    }

    /// Conjunction that flattens nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), other) => {
                left.push(other);
                Predicate::And(left)
            }
            (this, Predicate::And(mut right)) => {
                right.insert(0, this);
                Predicate::And(right)
            }
            (this, other) => Predicate::And(vec![this, other]),
        }
    }

    /// Values `column` can take in any row this predicate admits.
    ///
    /// `None` means the column is not constrained to a known set: it is not
    /// mentioned, or only under `$not` or in some branches of an `$or`.
    pub fn pinned_values(&self, column: &str) -> Option<BTreeSet<String>> {
        match self {
            Predicate::Condition { column: c, op, data } if c == column => match (op, data) {
                (FilterOp::Eq, Value::Null) => None,
                (FilterOp::Eq, v) => Some(BTreeSet::from([value_key(v)])),
                (FilterOp::In, Value::Array(values)) => Some(values.iter().map(value_key).collect()),
                (FilterOp::In, v) if !v.is_null() => Some(BTreeSet::from([value_key(v)])),
                _ => None,
            },
            Predicate::Condition { .. } => None,
            Predicate::Tenant { column: c, tenant_id } if c == column => {
                Some(BTreeSet::from([tenant_id.to_string()]))
            }
            Predicate::Tenant { .. } => None,
            Predicate::And(children) => children
                .iter()
                .filter_map(|child| child.pinned_values(column))
                .reduce(|acc, set| acc.intersection(&set).cloned().collect()),
            Predicate::Or(children) if !children.is_empty() => {
                let mut union = BTreeSet::new();
                for child in children {
                    union.extend(child.pinned_values(column)?);
                }
                Some(union)
            }
            Predicate::Or(_) | Predicate::Not(_) => None,
        }
    }

    pub fn count_tenant_nodes(&self) -> usize {
        match self {
            Predicate::Tenant { .. } => 1,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::count_tenant_nodes).sum()
            }
            Predicate::Not(inner) => inner.count_tenant_nodes(),
            Predicate::Condition { .. } => 0,
        }
    }

    /// Evaluate against a row held as a JSON object.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Predicate::Condition { column, op, data } => {
                condition_matches(row.get(column).unwrap_or(&Value::Null), *op, data)
            }
            Predicate::And(children) => children.iter().all(|p| p.matches(row)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(row)),
            Predicate::Not(inner) => !inner.matches(row),
            Predicate::Tenant { column, tenant_id } => row
                .get(column)
                .map(|v| value_key(v) == tenant_id.to_string())
                .unwrap_or(false),
        }
    }
}

pub(crate) fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordering between two JSON scalars of the same kind.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn condition_matches(field: &Value, op: FilterOp, data: &Value) -> bool {
    // SQL semantics: comparisons against NULL never hold.
    let cmp = |expected: &[Ordering]| {
        !field.is_null()
            && compare_values(field, data).map_or(false, |ord| expected.contains(&ord))
    };
    match op {
        FilterOp::Eq if data.is_null() => field.is_null(),
        FilterOp::Ne if data.is_null() => !field.is_null(),
        FilterOp::Eq => cmp(&[Ordering::Equal]),
        FilterOp::Ne => !field.is_null() && compare_values(field, data) != Some(Ordering::Equal),
        FilterOp::Gt => cmp(&[Ordering::Greater]),
        FilterOp::Gte => cmp(&[Ordering::Greater, Ordering::Equal]),
        FilterOp::Lt => cmp(&[Ordering::Less]),
        FilterOp::Lte => cmp(&[Ordering::Less, Ordering::Equal]),
        FilterOp::Like | FilterOp::ILike => match (field, data) {
            (Value::String(text), Value::String(pattern)) => {
                like_matches(pattern, text, op == FilterOp::ILike)
            }
            _ => false,
        },
        FilterOp::In | FilterOp::NIn => {
            if field.is_null() {
                return false;
            }
            let found = match data {
                Value::Array(values) => values
                    .iter()
                    .any(|v| compare_values(field, v) == Some(Ordering::Equal)),
                v => compare_values(field, v) == Some(Ordering::Equal),
            };
            found == (op == FilterOp::In)
        }
        FilterOp::Between => match data {
            Value::Array(bounds) if bounds.len() == 2 && !field.is_null() => {
                matches!(compare_values(field, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare_values(field, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}

/// SQL `LIKE` with `%` and `_` wildcards.
fn like_matches(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text): (Vec<char>, Vec<char>) = if case_insensitive {
        (pattern.to_lowercase().chars().collect(), text.to_lowercase().chars().collect())
    } else {
        (pattern.chars().collect(), text.chars().collect())
    };

    // dp[j]: pattern[..i] matches text[..j]
    let mut dp = vec![false; text.len() + 1];
    dp[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= dp[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=text.len() {
                    next[j] = dp[j - 1];
                }
            }
            c => {
                for j in 1..=text.len() {
                    next[j] = dp[j - 1] && text[j - 1] == *c;
                }
            }
        }
        dp = next;
    }
    dp[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(column: &str, op: FilterOp, data: Value) -> Predicate {
        Predicate::Condition {
            column: column.to_string(),
            op,
            data,
        }
    }

    #[test]
    fn conjunctive_equality_pins_column() {
        let p = Predicate::eq("name", "Ada").and(Predicate::eq("tenant_id", "t1"));
        assert_eq!(p.pinned_values("tenant_id"), Some(BTreeSet::from(["t1".to_string()])));
        assert_eq!(p.pinned_values("other"), None);
    }

    #[test]
    fn partial_or_and_not_do_not_pin() {
        let or = Predicate::Or(vec![Predicate::eq("tenant_id", "t1"), Predicate::eq("name", "x")]);
        assert_eq!(or.pinned_values("tenant_id"), None);

        let not = Predicate::Not(Box::new(Predicate::eq("tenant_id", "t1")));
        assert_eq!(not.pinned_values("tenant_id"), None);

        let ne = cond("tenant_id", FilterOp::Ne, json!("t1"));
        assert_eq!(ne.pinned_values("tenant_id"), None);
    }

    #[test]
    fn full_or_pins_union() {
        let or = Predicate::Or(vec![
            Predicate::eq("tenant_id", "t1"),
            cond("tenant_id", FilterOp::In, json!(["t2", "t3"])),
        ]);
        let pinned = or.pinned_values("tenant_id").unwrap();
        assert_eq!(pinned.len(), 3);
    }

    #[test]
    fn and_intersects_pins() {
        let p = Predicate::And(vec![
            cond("tenant_id", FilterOp::In, json!(["t1", "t2"])),
            Predicate::eq("tenant_id", "t2"),
        ]);
        assert_eq!(p.pinned_values("tenant_id"), Some(BTreeSet::from(["t2".to_string()])));
    }

    #[test]
    fn tenant_node_matches_rows() {
        let tenant = TenantId::random();
        let p = Predicate::tenant("tenant_id", tenant);
        assert!(p.matches(&json!({ "tenant_id": tenant.to_string() })));
        assert!(!p.matches(&json!({ "tenant_id": TenantId::random().to_string() })));
        assert!(!p.matches(&json!({ "name": "no owner" })));
    }

    #[test]
    fn comparison_operators_follow_sql_null_semantics() {
        let row = json!({ "age": 40, "nickname": null });
        assert!(cond("age", FilterOp::Gte, json!(40)).matches(&row));
        assert!(!cond("age", FilterOp::Lt, json!(40)).matches(&row));
        assert!(cond("nickname", FilterOp::Eq, Value::Null).matches(&row));
        assert!(!cond("nickname", FilterOp::Ne, json!("x")).matches(&row));
        assert!(cond("age", FilterOp::Between, json!([30, 50])).matches(&row));
        assert!(cond("age", FilterOp::NIn, json!([1, 2])).matches(&row));
    }

    #[test]
    fn like_wildcards() {
        assert!(like_matches("Ad%", "Ada Lovelace", false));
        assert!(like_matches("_da", "Ada", false));
        assert!(!like_matches("ad%", "Ada", false));
        assert!(like_matches("ad%", "Ada", true));
        assert!(like_matches("%", "", false));
    }
}
