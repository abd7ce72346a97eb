//! Error types for the live engine.

use thiserror::Error;

/// All possible errors from the live engine.
///
/// Errors are cloneable so a reconciler can keep the one that put it into the
/// `error` state and hand copies to every observer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Remote data service errors
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("subscription failed: {0}")]
    Subscription(String),

    // Input errors
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("record has no key")]
    MissingKey,

    // Replay errors
    #[error("replay position {position} out of range (log has {len} events)")]
    ReplayOutOfRange { position: usize, len: usize },
}

impl Error {
    /// The message surfaced to the presentation layer in `Status::Error`.
    ///
    /// For remote failures this is the underlying message without the
    /// engine's prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Fetch(msg) | Error::Subscription(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error came from the remote data service.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Subscription(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::Fetch("connection refused".into());
        assert_eq!(err.to_string(), "fetch failed: connection refused");

        let err = Error::InvalidIdentifier("drop table".into());
        assert_eq!(err.to_string(), "invalid identifier: \"drop table\"");

        let err = Error::ReplayOutOfRange {
            position: 7,
            len: 5,
        };
        assert_eq!(
            err.to_string(),
            "replay position 7 out of range (log has 5 events)"
        );
    }

    #[test]
    fn message_strips_remote_prefix() {
        assert_eq!(Error::Fetch("timeout".into()).message(), "timeout");
        assert_eq!(
            Error::Subscription("channel closed".into()).message(),
            "channel closed"
        );
        assert_eq!(Error::MissingKey.message(), "record has no key");
    }

    #[test]
    fn remote_classification() {
        assert!(Error::Fetch("x".into()).is_remote());
        assert!(Error::Subscription("x".into()).is_remote());
        assert!(!Error::MissingKey.is_remote());
    }
}
