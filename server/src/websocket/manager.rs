//! WebSocket session manager.
//!
//! Tracks live dashboard sessions: what each one is watching, since when,
//! and the channel its socket writer drains.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket session.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: String,
    /// Channel name of the query being watched
    pub scope: String,
    /// When the socket connected
    pub connected_at: DateTime<Utc>,
    /// Channel to send messages to this session
    pub sender: MessageSender,
}

/// Public view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub scope: String,
    pub connected_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            scope: session.scope.clone(),
            connected_at: session.connected_at,
        }
    }
}

/// Manages active WebSocket sessions.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a new session manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new session.
    ///
    /// Returns the session ID.
    pub fn register(&self, scope: String, sender: MessageSender) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();

        let session = Session {
            id: session_id.clone(),
            scope: scope.clone(),
            connected_at: Utc::now(),
            sender,
        };
        self.sessions.insert(session_id.clone(), session);

        tracing::info!(session_id = %session_id, scope = %scope, "WebSocket session registered");

        session_id
    }

    /// Unregister a session.
    pub fn unregister(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                tracing::info!(
                    session_id = %session_id,
                    scope = %session.scope,
                    "WebSocket session unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Record that a session now watches a different scope.
    pub fn rescope(&self, session_id: &str, scope: String) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.scope = scope;
                true
            }
            None => false,
        }
    }

    /// Send a message to a specific session.
    ///
    /// Returns false if the session is gone or its writer has stopped.
    pub fn send_to(&self, session_id: &str, message: ServerMessage) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => session.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Look up a session.
    pub fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|s| SessionInfo::from(s.value()))
    }

    /// Every session, oldest connection first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|s| SessionInfo::from(s.value()))
            .collect();
        sessions.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    /// Get the number of active sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let session_id = manager.register("companies-changes".to_string(), tx);
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.get(&session_id).unwrap().scope, "companies-changes");

        assert!(manager.unregister(&session_id));
        assert!(!manager.unregister(&session_id));
        assert_eq!(manager.session_count(), 0);
        assert!(manager.get(&session_id).is_none());
    }

    #[test]
    fn test_list_sessions() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = manager.register("companies-changes".to_string(), tx.clone());
        let second = manager.register("claims-A".to_string(), tx);

        let sessions = manager.list();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().any(|s| s.id == first && s.scope == "companies-changes"));
        assert!(sessions.iter().any(|s| s.id == second && s.scope == "claims-A"));
        assert!(sessions[0].connected_at <= sessions[1].connected_at);
    }

    #[test]
    fn test_rescope() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session_id = manager.register("claims-A".to_string(), tx);

        assert!(manager.rescope(&session_id, "claims-B".to_string()));
        assert_eq!(manager.get(&session_id).unwrap().scope, "claims-B");
        assert!(!manager.rescope("missing", "claims-C".to_string()));
    }

    #[test]
    fn test_send_to() {
        let manager = SessionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session_id = manager.register("companies-changes".to_string(), tx);

        assert!(manager.send_to(&session_id, ServerMessage::Pong));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Pong));

        drop(rx);
        assert!(!manager.send_to(&session_id, ServerMessage::Pong));
        assert!(!manager.send_to("missing", ServerMessage::Pong));
    }
}
