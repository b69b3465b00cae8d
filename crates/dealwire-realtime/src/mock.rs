//! Scriptable in-memory transport for testing.
//!
//! Enable with `features = ["mock"]` or use from this crate's unit tests.
//!
//! # Example
//!
//! ```ignore
//! use dealwire_realtime::mock::MockConnector;
//!
//! let connector = MockConnector::new();
//! connector.fail_next(2);
//! let client = RealtimeClient::with_connector(config, connector.shared(), env);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use dealwire_core::{ClientMessage, Error, Result, ServerMessage};

use crate::transport::{Connection, Connector, SessionAuth};

enum Inbound {
    Message(ServerMessage),
    Raw(String),
    Reset,
}

#[derive(Default)]
struct MockState {
    attempts: Vec<Instant>,
    auths: Vec<SessionAuth>,
    fail_next: usize,
    refuse_all: bool,
    fail_pings: bool,
    connections: usize,
    closes: usize,
    pings: usize,
    live: Option<(usize, mpsc::UnboundedSender<Inbound>)>,
    sent: Vec<ClientMessage>,
}

/// Connector whose connections are driven from the test body.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same connector as a trait object, for `RealtimeClient::with_connector`.
    pub fn shared(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next `n` handshakes.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Refuse every handshake until called again with `false`.
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Make keepalive pings fail on the live connection.
    pub fn fail_pings(&self, fail: bool) {
        self.lock().fail_pings = fail;
    }

    /// Time of every handshake attempt, successful or not.
    pub fn attempts(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    /// Number of handshakes that succeeded.
    pub fn connection_count(&self) -> usize {
        self.lock().connections
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    pub fn ping_count(&self) -> usize {
        self.lock().pings
    }

    pub fn last_auth(&self) -> Option<SessionAuth> {
        self.lock().auths.last().cloned()
    }

    pub fn is_live(&self) -> bool {
        self.lock().live.is_some()
    }

    /// Every message the client sent, across all connections.
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.lock().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Deliver a message on the live connection. Returns `false` if none.
    pub fn push(&self, message: ServerMessage) -> bool {
        self.deliver(Inbound::Message(message))
    }

    /// Deliver a raw text frame on the live connection.
    pub fn push_raw(&self, frame: impl Into<String>) -> bool {
        self.deliver(Inbound::Raw(frame.into()))
    }

    /// Break the live connection as if the network failed.
    pub fn drop_connection(&self) -> bool {
        let live = self.lock().live.take();
        match live {
            Some((_, tx)) => tx.send(Inbound::Reset).is_ok(),
            None => false,
        }
    }

    fn deliver(&self, inbound: Inbound) -> bool {
        let state = self.lock();
        match &state.live {
            Some((_, tx)) => tx.send(inbound).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, auth: &SessionAuth) -> Result<Box<dyn Connection>> {
        let mut state = self.lock();
        state.attempts.push(Instant::now());
        state.auths.push(auth.clone());

        if state.refuse_all {
            return Err(Error::Transport("connection refused".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::Transport("connection refused".to_string()));
        }

        state.connections += 1;
        let id = state.connections;
        let (tx, rx) = mpsc::unbounded_channel();
        state.live = Some((id, tx));

        Ok(Box::new(MockConnection {
            id,
            inbound: rx,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    id: usize,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(state: &MockState, id: usize) -> bool {
        matches!(&state.live, Some((live, _)) if *live == id)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let mut state = self.lock();
        if !Self::is_live(&state, self.id) {
            return Err(Error::Transport("connection reset".to_string()));
        }
        state.sent.push(message.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        match self.inbound.recv().await? {
            Inbound::Message(message) => Some(Ok(message)),
            Inbound::Raw(frame) => Some(ServerMessage::from_frame(&frame)),
            Inbound::Reset => Some(Err(Error::Transport("connection reset".to_string()))),
        }
    }

    async fn ping(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.pings += 1;
        if state.fail_pings {
            return Err(Error::Transport("ping failed".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.lock();
        state.closes += 1;
        if Self::is_live(&state, self.id) {
            state.live = None;
        }
    }
}
