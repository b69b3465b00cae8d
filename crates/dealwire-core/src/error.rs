//! Error types for dealwire.

use thiserror::Error;

/// Result type alias using dealwire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dealwire operations.
///
/// Channel-level failures never reach application callers as `Err`; they are
/// converted into `connection_status` transitions by the realtime client.
/// The variants here flow between internal layers and out of the push APIs
/// that report soft failures through logging.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failed to connect, send, or receive
    #[error("Transport error: {0}")]
    Transport(String),

    /// Peer sent a frame that violates the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Platform push API reported a failure
    #[error("Push error: {0}")]
    Push(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Client or channel has been shut down
    #[error("Closed: {0}")]
    Closed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_error_display_protocol() {
        let err = Error::Protocol("unexpected binary frame".to_string());
        assert_eq!(err.to_string(), "Protocol error: unexpected binary frame");
    }

    #[test]
    fn test_error_display_push() {
        let err = Error::Push("endpoint expired".to_string());
        assert_eq!(err.to_string(), "Push error: endpoint expired");
    }

    #[test]
    fn test_error_display_closed() {
        let err = Error::Closed("client disposed".to_string());
        assert_eq!(err.to_string(), "Closed: client disposed");
    }

    #[test]
    fn test_malformed_frame_maps_to_serialization() {
        let err: Error = serde_json::from_str::<crate::ServerMessage>(r#"{"type":"notification"}"#)
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization(msg) if msg.contains("notification")));
    }

    #[test]
    fn test_error_crosses_task_boundaries() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Error>();
    }
}
