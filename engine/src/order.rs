//! Sort order for collection views.
//!
//! The comparator mirrors the snapshot query the data service runs
//! (`ORDER BY <field> <dir> NULLS LAST`) so that a freshly fetched snapshot
//! and a view maintained by change events agree on order.

use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "asc")]
    Ascending,
    #[default]
    #[serde(alias = "desc")]
    Descending,
}

impl Direction {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Field + direction a view is ordered by.
///
/// Ordering rules:
/// 1. Missing or null values sort last, in either direction
/// 2. Numbers compare numerically, strings lexicographically, bools false < true
/// 3. Values of different types rank number < string < bool < array < object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    /// Column to order by
    pub field: String,
    /// Direction of the order
    pub direction: Direction,
}

impl SortSpec {
    /// Order by a field, highest first.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Order by a field, lowest first.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    /// Compare two records by this order.
    ///
    /// Records with equal sort values compare `Equal`; the view breaks those
    /// ties by first-seen order.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let a = sort_value(a, &self.field);
        let b = sort_value(b, &self.field);
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ord = compare_values(a, b);
                match self.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
        }
    }
}

fn sort_value<'a>(record: &'a Record, field: &str) -> Option<SortKey<'a>> {
    if field == "id" {
        return Some(SortKey::Key(&record.id));
    }
    match record.field(field) {
        None | Some(Value::Null) => None,
        Some(v) => Some(SortKey::Value(v)),
    }
}

enum SortKey<'a> {
    Key(&'a str),
    Value(&'a Value),
}

fn compare_values(a: SortKey<'_>, b: SortKey<'_>) -> Ordering {
    match (a, b) {
        (SortKey::Key(a), SortKey::Key(b)) => a.cmp(b),
        (SortKey::Key(a), SortKey::Value(b)) => compare_json(&Value::String(a.to_string()), b),
        (SortKey::Value(a), SortKey::Key(b)) => compare_json(a, &Value::String(b.to_string())),
        (SortKey::Value(a), SortKey::Value(b)) => compare_json(a, b),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, fields: Value) -> Record {
        Record::new(id, fields)
    }

    #[test]
    fn descending_by_number() {
        let order = SortSpec::descending("tci_score");
        let a = rec("A", json!({"tci_score": 50}));
        let b = rec("B", json!({"tci_score": 80}));
        assert_eq!(order.compare(&b, &a), Ordering::Less);
        assert_eq!(order.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn ascending_by_string() {
        let order = SortSpec::ascending("created_at");
        let a = rec("A", json!({"created_at": "2024-01-11T11:00:00Z"}));
        let b = rec("B", json!({"created_at": "2024-01-15T10:30:00Z"}));
        assert_eq!(order.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        let order = SortSpec::ascending("score");
        let a = rec("A", json!({"score": 9}));
        let b = rec("B", json!({"score": 10.5}));
        assert_eq!(order.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn nulls_last_in_both_directions() {
        let present = rec("A", json!({"score": 1}));
        let missing = rec("B", json!({}));
        let null = rec("C", json!({"score": null}));

        for order in [SortSpec::ascending("score"), SortSpec::descending("score")] {
            assert_eq!(order.compare(&present, &missing), Ordering::Less);
            assert_eq!(order.compare(&missing, &present), Ordering::Greater);
            assert_eq!(order.compare(&missing, &null), Ordering::Equal);
        }
    }

    #[test]
    fn equal_values_are_equal() {
        let order = SortSpec::descending("score");
        let a = rec("A", json!({"score": 70}));
        let b = rec("B", json!({"score": 70}));
        assert_eq!(order.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn mixed_types_rank_by_type() {
        let order = SortSpec::ascending("v");
        let num = rec("A", json!({"v": 100}));
        let text = rec("B", json!({"v": "1"}));
        let flag = rec("C", json!({"v": true}));
        assert_eq!(order.compare(&num, &text), Ordering::Less);
        assert_eq!(order.compare(&text, &flag), Ordering::Less);
    }

    #[test]
    fn order_by_key() {
        let order = SortSpec::ascending("id");
        assert_eq!(
            order.compare(&rec("a", json!({})), &rec("b", json!({}))),
            Ordering::Less
        );
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_value(SortSpec::descending("tci_score")).unwrap();
        assert_eq!(json, json!({"field": "tci_score", "direction": "descending"}));

        let parsed: SortSpec =
            serde_json::from_value(json!({"field": "x", "direction": "asc"})).unwrap();
        assert_eq!(parsed, SortSpec::ascending("x"));
    }
}
