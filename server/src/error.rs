//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] tci_live_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(e) if e.is_remote() => StatusCode::BAD_GATEWAY,
            AppError::Engine(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_message, details) = match &self {
            AppError::Engine(e) if e.is_remote() => {
                tracing::error!("Data service error: {:?}", e);
                ("Data service error".to_string(), Some(e.message()))
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (e.to_string(), None)
            }
            AppError::BadRequest(msg) => (msg.clone(), None),
            AppError::NotFound(msg) => (format!("Not found: {}", msg), None),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), Some(msg.clone()))
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tci_live_engine::Error;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(Error::Fetch("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(Error::Subscription("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(Error::InvalidIdentifier("a;b".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("company x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal("oops".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_status() {
        let response = AppError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
