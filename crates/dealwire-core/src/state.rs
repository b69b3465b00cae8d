//! Connection state of the realtime channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Health of the single logical connection owned by a realtime client.
///
/// ```text
/// Disconnected --connect--> Connecting --ack--> Connected
///      ^                        |                  |
///      |                    (failure)         (unsolicited drop)
///      |                        v                  v
///      +------(attempts exhausted)------- Reconnecting
/// ```
///
/// `Disconnected` is both the initial state and the terminal state after the
/// backoff schedule runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True while the client is working towards a connection on its own.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(ConnectionState::Connecting.is_in_flight());
        assert!(ConnectionState::Reconnecting.is_in_flight());
        assert!(!ConnectionState::Disconnected.is_in_flight());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Reconnecting).unwrap();
        assert_eq!(json, r#""reconnecting""#);
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
