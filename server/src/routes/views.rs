//! Dashboard view routes.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tci_live_engine::{Company, COMPANIES};

use crate::error::{AppError, Result};
use crate::handlers::{company_detail, handle_websocket_connection, list_companies, CompanyDetail};
use crate::websocket::scope_query;
use crate::AppState;

/// Query string of the WebSocket endpoint.
#[derive(Debug, Deserialize)]
pub struct WatchParams {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
}

/// Create view routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/companies", get(companies_handler))
        .route("/companies/{id}", get(company_handler))
        .route("/ws", get(ws_handler))
}

/// GET /companies - Snapshot of every company.
async fn companies_handler(State(state): State<AppState>) -> Result<Json<Vec<Company>>> {
    let companies = list_companies(state.source.as_ref()).await?;
    Ok(Json(companies))
}

/// GET /companies/{id} - One company with its claims.
async fn company_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompanyDetail>> {
    let detail = company_detail(state.source.as_ref(), &id).await?;
    Ok(Json(detail))
}

/// GET /ws - Live view over WebSocket.
///
/// The scope is checked before upgrading, so a bad query string is a plain
/// 400 instead of a socket that closes right away.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WatchParams>,
) -> Result<Response> {
    let resource = params.resource.as_deref().unwrap_or(COMPANIES);
    let query =
        scope_query(resource, params.company_id.as_deref()).map_err(AppError::BadRequest)?;

    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, state, query)))
}
