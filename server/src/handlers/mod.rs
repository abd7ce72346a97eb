//! Request handlers for dashboard views.

mod views;
mod websocket;

pub use views::*;
pub use websocket::*;
