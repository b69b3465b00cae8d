//! Public handle to the realtime delivery channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use dealwire_core::logging::SUBSYSTEM_REALTIME;
use dealwire_core::{
    ClientEvent, ClientMessage, ConnectionState, EnvironmentSignals, Error, EventDispatcher,
    EventKind, ListenerId, Result,
};

use crate::config::RealtimeConfig;
use crate::connection::{Command, ConnectionTask};
use crate::transport::{Connector, SessionAuth};
use crate::ws::WsConnector;

/// Realtime notification client.
///
/// Owns one background connection task. Every method returns immediately;
/// transport failures are never returned to callers and surface only as
/// `connection_status` events and state changes.
///
/// Must be created inside a tokio runtime.
pub struct RealtimeClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    dispatcher: Arc<EventDispatcher>,
    task: JoinHandle<()>,
}

impl RealtimeClient {
    /// Create a client that connects over WebSocket to `config.url`.
    pub fn new(config: RealtimeConfig, env: EnvironmentSignals) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(WsConnector::new(config.url.clone()));
        Self::with_connector(config, connector, env)
    }

    /// Create a client over a custom transport.
    pub fn with_connector(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        env: EnvironmentSignals,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let dispatcher = Arc::new(EventDispatcher::new());

        let task = ConnectionTask::new(
            &config,
            connector,
            command_rx,
            state_tx,
            Arc::clone(&dispatcher),
            env,
        );
        let task = tokio::spawn(task.run());

        Self {
            commands,
            state,
            dispatcher,
            task,
        }
    }

    async fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Closed("realtime connection task has stopped".to_string()))
    }

    /// Open the channel with an opaque bearer credential bound to an
    /// organization scope.
    ///
    /// No-op unless currently `Disconnected`. Only fails if the client has
    /// been shut down.
    pub async fn connect(
        &self,
        credential: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<()> {
        let auth = SessionAuth::new(credential, scope);
        self.command(Command::Connect { auth }).await
    }

    /// Tear the channel down and forget all topics.
    ///
    /// Cancels any pending reconnection. Resolves once the task has applied
    /// the teardown.
    pub async fn disconnect(&self) {
        let (done, applied) = oneshot::channel();
        if self.command(Command::Disconnect { done }).await.is_ok() {
            let _ = applied.await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the client reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| Error::Closed("realtime connection task has stopped".to_string()))
    }

    /// Subscribe to a topic. Sent now if connected, otherwise on the next
    /// successful connection.
    pub async fn join(&self, topic: impl Into<String>) -> Result<()> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(Error::InvalidInput("topic id must not be empty".to_string()));
        }
        self.command(Command::Join { topic }).await
    }

    /// Unsubscribe from a topic. No-op if not a member.
    pub async fn leave(&self, topic: impl Into<String>) -> Result<()> {
        self.command(Command::Leave {
            topic: topic.into(),
        })
        .await
    }

    /// Current topic membership, in order.
    ///
    /// Also acts as a barrier: every command sent before it has been applied.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let (reply, topics) = oneshot::channel();
        self.command(Command::Topics { reply }).await?;
        topics
            .await
            .map_err(|_| Error::Closed("realtime connection task has stopped".to_string()))
    }

    /// Tell the server a notification was read. Dropped when not connected.
    pub async fn mark_notification_read(&self, notification_id: impl Into<String>) -> Result<()> {
        let message = ClientMessage::MarkNotificationRead {
            notification_id: notification_id.into(),
        };
        self.command(Command::Send { message }).await
    }

    /// Broadcast a typing indicator for a topic. Dropped when not connected.
    pub async fn send_typing(&self, topic: impl Into<String>, is_typing: bool) -> Result<()> {
        let message = ClientMessage::UserTyping {
            topic_id: topic.into(),
            is_typing,
        };
        self.command(Command::Send { message }).await
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.dispatcher.off(kind, id)
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Disconnect, stop the background task and drop every listener.
    pub async fn dispose(self) {
        let Self {
            commands,
            dispatcher,
            task,
            ..
        } = self;
        drop(commands);
        if let Err(err) = task.await {
            debug!(subsystem = SUBSYSTEM_REALTIME, error = %err, "Connection task ended abnormally");
        }
        dispatcher.clear();
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
