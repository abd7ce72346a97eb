//! HTTP route definitions.

mod health;
mod sessions;
mod views;

use crate::AppState;
use axum::Router;

pub use views::WatchParams;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(sessions::routes())
        .merge(views::routes())
}
