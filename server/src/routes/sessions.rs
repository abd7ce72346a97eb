//! Session inspection endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::websocket::SessionInfo;
use crate::AppState;

/// Create session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
}

/// GET /sessions - Every connected dashboard, oldest first.
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list())
}

/// GET /sessions/{id} - One session.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>> {
    state
        .sessions
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
}
