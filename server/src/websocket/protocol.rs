//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use serde::{Deserialize, Serialize};
use tci_live_engine::{ResourceQuery, ViewState, CLAIMS, COMPANIES};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Follow a different resource, e.g. after navigating to another
    /// company page.
    Watch {
        /// `companies` or `claims`
        resource: String,
        /// Company to scope to; required for claims
        #[serde(default)]
        company_id: Option<String>,
        /// Request ID for correlating errors
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Start over after an error.
    Retry,

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current view of the watched resource. Sent on every visible change.
    View {
        #[serde(flatten)]
        state: ViewState,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create a view message.
    pub fn view(state: ViewState) -> Self {
        ServerMessage::View { state }
    }

    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }
}

/// Resolve a resource name and optional company into the query the
/// dashboard uses for it.
pub fn scope_query(resource: &str, company_id: Option<&str>) -> Result<ResourceQuery, String> {
    match (resource, company_id) {
        (COMPANIES, None) => Ok(ResourceQuery::companies()),
        (COMPANIES, Some(id)) => Ok(ResourceQuery::company(id)),
        (CLAIMS, Some(id)) => Ok(ResourceQuery::claims_for(id)),
        (CLAIMS, None) => Err("claims require a company_id".to_string()),
        (other, _) => Err(format!("unknown resource: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialization() {
        let json = r#"{"type": "watch", "resource": "claims", "company_id": "c-1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Watch {
                resource,
                company_id,
                request_id,
            } => {
                assert_eq!(resource, "claims");
                assert_eq!(company_id, Some("c-1".to_string()));
                assert!(request_id.is_none());
            }
            _ => panic!("Expected Watch message"),
        }

        let json = r#"{"type": "retry"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Retry));
    }

    #[test]
    fn test_server_message_serialization() {
        let msg = ServerMessage::Pong;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let msg = ServerMessage::error("test error", Some("req-1".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""message":"test error""#));
        assert!(json.contains(r#""request_id":"req-1""#));
    }

    #[test]
    fn test_view_message_is_flat() {
        let msg = ServerMessage::view(ViewState::loading(&ResourceQuery::companies()));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "view");
        assert_eq!(value["resource"], "companies");
        assert_eq!(value["status"]["state"], "loading");
        assert_eq!(value["items"], serde_json::json!([]));
    }

    #[test]
    fn test_scope_query() {
        assert_eq!(scope_query("companies", None), Ok(ResourceQuery::companies()));
        assert_eq!(
            scope_query("claims", Some("c-1")),
            Ok(ResourceQuery::claims_for("c-1"))
        );
        assert!(scope_query("claims", None).is_err());
        assert!(scope_query("users", None).is_err());
    }
}
