//! Change events delivered by the data service's change stream.
//!
//! The stream speaks in row payloads (`{eventType, new, old}`); the engine
//! works with [`ChangeEvent`], which is what a payload means for one keyed
//! collection.

use crate::{error::Result, Error, Record, RecordKey, ResourceName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change reported by the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single change to a keyed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangeEvent {
    /// A row appeared
    Insert { record: Record },
    /// A row's payload changed
    Update { record: Record },
    /// A row was removed
    Delete { key: RecordKey },
}

impl ChangeEvent {
    /// Create an insert event.
    pub fn insert(record: Record) -> Self {
        ChangeEvent::Insert { record }
    }

    /// Create an update event.
    pub fn update(record: Record) -> Self {
        ChangeEvent::Update { record }
    }

    /// Create a delete event.
    pub fn delete(key: impl Into<RecordKey>) -> Self {
        ChangeEvent::Delete { key: key.into() }
    }

    /// Get the key this event targets.
    pub fn key(&self) -> &RecordKey {
        match self {
            ChangeEvent::Insert { record } | ChangeEvent::Update { record } => &record.id,
            ChangeEvent::Delete { key } => key,
        }
    }

    /// Get the kind of this event.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }
}

/// Raw change notification as emitted by the data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    /// Resource (table) the change happened in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<ResourceName>,
    /// What happened
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    /// Row after the change (insert/update)
    #[serde(default)]
    pub new: Option<Value>,
    /// Row before the change (update/delete); at least its key
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangePayload {
    /// Parse a payload from its JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// The row a filter should be evaluated against: the new row when
    /// present, else the old one.
    pub fn row(&self) -> Option<&Value> {
        match &self.new {
            Some(Value::Null) | None => self.old.as_ref(),
            Some(row) => Some(row),
        }
    }

    /// Whether this payload belongs to the given resource.
    ///
    /// Payloads without a table are assumed to come from a per-resource
    /// channel and always match.
    pub fn is_for(&self, resource: &str) -> bool {
        self.table.as_deref().map_or(true, |t| t == resource)
    }
}

impl TryFrom<ChangePayload> for ChangeEvent {
    type Error = Error;

    fn try_from(payload: ChangePayload) -> Result<Self> {
        match payload.event_type {
            ChangeKind::Insert => Ok(ChangeEvent::insert(new_record(payload.new)?)),
            ChangeKind::Update => Ok(ChangeEvent::update(new_record(payload.new)?)),
            ChangeKind::Delete => {
                let key = match payload.old {
                    Some(old) => Record::from_row(old)?.id,
                    None => {
                        return Err(Error::InvalidPayload(
                            "DELETE payload without old row".to_string(),
                        ))
                    }
                };
                Ok(ChangeEvent::delete(key))
            }
        }
    }
}

fn new_record(new: Option<Value>) -> Result<Record> {
    match new {
        Some(Value::Null) | None => Err(Error::InvalidPayload(
            "payload without new row".to_string(),
        )),
        Some(row) => Record::from_row(row),
    }
}
