//! Lifecycle status and the observable state of a reconciler.

use crate::{Filter, Record, ResourceName, ResourceQuery, Revision};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reconciler, as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum Status {
    /// Waiting for the initial snapshot
    #[default]
    Loading,
    /// Snapshot applied, following the change stream
    Ready,
    /// Snapshot or subscription failed; carries the underlying message
    Error(String),
}

impl Status {
    /// Check if still waiting for a snapshot.
    pub fn is_loading(&self) -> bool {
        matches!(self, Status::Loading)
    }

    /// Check if the view is live.
    pub fn is_ready(&self) -> bool {
        matches!(self, Status::Ready)
    }

    /// Get the error message, if failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Status::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Everything the presentation layer renders from one reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Resource the view follows
    pub resource: ResourceName,
    /// Filter scoping the view, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Lifecycle status
    pub status: Status,
    /// Records in view order
    pub items: Vec<Record>,
    /// Bumped on every visible change
    pub revision: Revision,
}

impl ViewState {
    /// Initial state for a query that has not loaded yet.
    pub fn loading(query: &ResourceQuery) -> Self {
        Self {
            resource: query.resource.clone(),
            filter: query.filter.clone(),
            status: Status::Loading,
            items: Vec::new(),
            revision: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serialization_format() {
        assert_eq!(
            serde_json::to_value(Status::Loading).unwrap(),
            json!({"state": "loading"})
        );
        assert_eq!(
            serde_json::to_value(Status::Ready).unwrap(),
            json!({"state": "ready"})
        );
        assert_eq!(
            serde_json::to_value(Status::Error("boom".into())).unwrap(),
            json!({"state": "error", "message": "boom"})
        );
    }

    #[test]
    fn status_accessors() {
        assert!(Status::default().is_loading());
        assert!(Status::Ready.is_ready());
        assert_eq!(Status::Error("x".into()).error(), Some("x"));
        assert_eq!(Status::Ready.error(), None);
    }

    #[test]
    fn loading_state_for_query() {
        let state = ViewState::loading(&ResourceQuery::claims_for("c-1"));
        assert_eq!(state.resource, "claims");
        assert_eq!(state.filter, Some(Filter::eq("company_id", "c-1")));
        assert!(state.status.is_loading());
        assert!(state.items.is_empty());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["filter"], json!({"field": "company_id", "value": "c-1"}));
        assert_eq!(json["revision"], json!(0));
    }
}
