//! TCI Live Server - live feed for the TCI dashboard.
//!
//! Keeps reconciled, sorted views of the data service's `companies` and
//! `claims` tables and pushes them to dashboard clients over WebSocket.
//! Point-in-time snapshots are also served over plain HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod live;
pub mod routes;
pub mod source;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::live::LiveOptions;
use crate::source::DataService;
use crate::websocket::SessionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn DataService>,
    pub live: LiveOptions,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    /// Create state around a data service.
    pub fn new(source: Arc<dyn DataService>, live: LiveOptions) -> Self {
        Self {
            source,
            live,
            sessions: SessionManager::new_shared(),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
