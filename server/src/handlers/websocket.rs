//! WebSocket handler for live dashboard views.
//!
//! Each connection owns one live collection. Its published states are
//! forwarded as `view` messages; client messages rescope or retry it.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tci_live_engine::ResourceQuery;
use tokio::sync::mpsc;

use crate::live::LiveCollection;
use crate::websocket::{scope_query, ClientMessage, ServerMessage, SessionManager};
use crate::AppState;

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the session and starts its live collection
/// 2. Spawns tasks that forward outgoing messages and view updates
/// 3. Processes incoming messages in a loop
/// 4. Disposes the collection and cleans up on disconnect
pub async fn handle_websocket_connection(socket: WebSocket, state: AppState, query: ResourceQuery) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create channel for sending messages to this session
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let session_id = state.sessions.register(query.channel_name(), tx);
    let live = LiveCollection::spawn(state.source.clone(), query, state.live.clone());

    tracing::info!(session_id = %session_id, "WebSocket client connected");

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    // Spawn task to push every published view
    let view_task = {
        let mut views = live.watch();
        let sessions = state.sessions.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            loop {
                let view = views.borrow_and_update().clone();
                if !sessions.send_to(&session_id, ServerMessage::view(view)) {
                    break;
                }
                if views.changed().await.is_err() {
                    break;
                }
            }
        })
    };

    // Process incoming messages
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(response) = process_message(&text, &live, &state.sessions, &session_id)
                {
                    state.sessions.send_to(&session_id, response);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up
    live.dispose().await;
    view_task.abort();
    state.sessions.unregister(&session_id);
    send_task.abort();

    tracing::info!(
        session_id = %session_id,
        active_sessions = state.sessions.session_count(),
        "WebSocket client disconnected"
    );
}

/// Process a client message. Returns the direct response, if any.
fn process_message(
    text: &str,
    live: &LiveCollection,
    sessions: &SessionManager,
    session_id: &str,
) -> Option<ServerMessage> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return Some(ServerMessage::error(
                format!("Invalid message format: {}", e),
                None,
            ));
        }
    };

    match client_msg {
        ClientMessage::Watch {
            resource,
            company_id,
            request_id,
        } => match scope_query(&resource, company_id.as_deref()) {
            Ok(query) => {
                sessions.rescope(session_id, query.channel_name());
                live.rescope(query);
                None
            }
            Err(message) => Some(ServerMessage::error(message, request_id)),
        },

        ClientMessage::Retry => {
            live.retry();
            None
        }

        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}
