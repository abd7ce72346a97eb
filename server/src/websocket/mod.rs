//! WebSocket feed for live dashboard views.
//!
//! Each connected client watches one resource at a time. The server keeps a
//! live collection for it and pushes the full view after every visible
//! change.

mod manager;
mod protocol;

pub use manager::{MessageSender, Session, SessionInfo, SessionManager};
pub use protocol::*;
