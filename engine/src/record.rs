//! Record type for rows received from the data service.

use crate::{error::Result, Error, RecordKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A keyed row as the dashboard receives it.
///
/// Only `id` has meaning to the engine. Every other column (scores,
/// timestamps, free text) is payload kept for presentation and for the sort
/// comparator. The JSON form is the flat row object: `{"id": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key of this record within its resource
    pub id: RecordKey,
    /// All other columns of the row
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record from a key and a JSON object of fields.
    ///
    /// A stray `id` inside `fields` is dropped; non-object payloads carry no
    /// fields.
    pub fn new(id: impl Into<RecordKey>, fields: Value) -> Self {
        let mut fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a raw row.
    ///
    /// Rows coming off a database trigger may carry numeric keys; those are
    /// rendered to their decimal form.
    pub fn from_row(row: Value) -> Result<Self> {
        let Value::Object(mut fields) = row else {
            return Err(Error::InvalidPayload(format!(
                "row must be a JSON object, got {}",
                type_name(&row)
            )));
        };
        let id = match fields.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => return Err(Error::MissingKey),
            Some(other) => {
                return Err(Error::InvalidPayload(format!(
                    "record key must be a string or number, got {}",
                    type_name(&other)
                )))
            }
        };
        Ok(Self { id, fields })
    }

    /// Get the record key.
    pub fn key(&self) -> &RecordKey {
        &self.id
    }

    /// Get a field value.
    ///
    /// `"id"` resolves to the key so comparators and filters can address it
    /// like any other column.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Borrow a payload field without cloning.
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a payload field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        let field = field.into();
        if field == "id" {
            return None;
        }
        self.fields.insert(field, value)
    }

    /// Get a numeric field as f64.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    /// Render back into a flat row object.
    pub fn to_row(&self) -> Value {
        let mut row = Map::with_capacity(self.fields.len() + 1);
        row.insert("id".to_string(), Value::String(self.id.clone()));
        for (k, v) in &self.fields {
            row.insert(k.clone(), v.clone());
        }
        Value::Object(row)
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_record() {
        let record = Record::new("A", json!({"name": "Acme", "tci_score": 50}));

        assert_eq!(record.id, "A");
        assert_eq!(record.field("name"), Some(&json!("Acme")));
        assert_eq!(record.number("tci_score"), Some(50.0));
        assert_eq!(record.get("id"), Some(json!("A")));
    }

    #[test]
    fn new_drops_embedded_id() {
        let record = Record::new("A", json!({"id": "B", "score": 1}));
        assert_eq!(record.id, "A");
        assert!(record.field("id").is_none());
    }

    #[test]
    fn from_row_accepts_numeric_key() {
        let record = Record::from_row(json!({"id": 42, "score": 3})).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.number("score"), Some(3.0));
    }

    #[test]
    fn from_row_rejects_missing_key() {
        assert_eq!(
            Record::from_row(json!({"score": 3})).unwrap_err(),
            Error::MissingKey
        );
        assert_eq!(
            Record::from_row(json!({"id": null})).unwrap_err(),
            Error::MissingKey
        );
    }

    #[test]
    fn from_row_rejects_non_object() {
        let err = Record::from_row(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn set_ignores_key_column() {
        let mut record = Record::new("A", json!({}));
        assert_eq!(record.set("id", json!("Z")), None);
        assert_eq!(record.id, "A");

        record.set("tci_score", json!(90));
        assert_eq!(record.number("tci_score"), Some(90.0));
    }

    #[test]
    fn flat_json_form() {
        let record = Record::new("A", json!({"tci_score": 50}));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"id": "A", "tci_score": 50}));
        assert_eq!(record.to_row(), json);

        let parsed: Record = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
