//! Transport seam between the connection task and the wire.
//!
//! The connection task only speaks [`ClientMessage`]/[`ServerMessage`]; how
//! frames travel is behind [`Connector`] and [`Connection`]. Production uses
//! the WebSocket implementation in [`crate::ws`].

use async_trait::async_trait;

use dealwire_core::{ClientMessage, Result, ServerMessage};

/// Credentials forwarded to the server at connect time.
///
/// The client does not validate them; it only carries them.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionAuth {
    credential: String,
    scope: String,
}

impl SessionAuth {
    pub fn new(credential: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            scope: scope.into(),
        }
    }

    /// Opaque bearer credential.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Organization the session is bound to.
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuth")
            .field("credential", &"[redacted]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Opens connections to the notification server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake. Success is the server's acknowledgement.
    async fn connect(&self, auth: &SessionAuth) -> Result<Box<dyn Connection>>;
}

/// One established, authenticated connection.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, message: &ClientMessage) -> Result<()>;

    /// Next inbound message.
    ///
    /// `None` means the peer closed the stream. `Some(Err(Error::Transport))`
    /// means the connection is broken; any other error is a bad frame that
    /// the caller may skip.
    async fn recv(&mut self) -> Option<Result<ServerMessage>>;

    /// Transport-level liveness probe.
    async fn ping(&mut self) -> Result<()>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_auth_debug_redacts_credential() {
        let auth = SessionAuth::new("secret-token", "org-1");
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("org-1"));
        assert_eq!(auth.credential(), "secret-token");
    }
}
