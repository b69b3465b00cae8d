//! Background connection task.
//!
//! One task per [`RealtimeClient`](crate::RealtimeClient) owns the live
//! connection, the state machine, the topic registry and the single
//! reconnection timer. Handles talk to it over an `mpsc` command channel;
//! everything else it reacts to is multiplexed with `tokio::select!`.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use dealwire_core::logging::SUBSYSTEM_REALTIME;
use dealwire_core::{
    new_v7, ClientEvent, ClientMessage, ConnectionState, EnvironmentSignals, Error,
    EventDispatcher, NetworkStatus, Result, ServerMessage, Visibility,
};

use crate::backoff::ReconnectPolicy;
use crate::config::RealtimeConfig;
use crate::topics::TopicRegistry;
use crate::transport::{Connection, Connector, SessionAuth};

type Handshake = BoxFuture<'static, Result<Box<dyn Connection>>>;

/// Requests from client handles to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect { auth: SessionAuth },
    Disconnect { done: oneshot::Sender<()> },
    Join { topic: String },
    Leave { topic: String },
    Send { message: ClientMessage },
    Topics { reply: oneshot::Sender<Vec<String>> },
}

pub(crate) struct ConnectionTask {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<ConnectionState>,
    dispatcher: Arc<EventDispatcher>,
    env: EnvironmentSignals,
    topics: TopicRegistry,
    conn: Option<Box<dyn Connection>>,
    handshake: Option<Handshake>,
    keepalive: Interval,
    auth: Option<SessionAuth>,
    /// Reconnection attempts made since the last successful handshake.
    attempt: u32,
    retry_at: Option<Instant>,
    /// Set by `disconnect`, cleared by `connect`.
    intentional: bool,
    connection_id: Option<Uuid>,
}

impl ConnectionTask {
    pub(crate) fn new(
        config: &RealtimeConfig,
        connector: Arc<dyn Connector>,
        commands: mpsc::Receiver<Command>,
        state: watch::Sender<ConnectionState>,
        dispatcher: Arc<EventDispatcher>,
        env: EnvironmentSignals,
    ) -> Self {
        let period = config.keepalive_interval.max(Duration::from_millis(1));
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            connector,
            policy: config.reconnect_policy(),
            connect_timeout: config.connect_timeout,
            commands,
            state,
            dispatcher,
            env,
            topics: TopicRegistry::new(),
            conn: None,
            handshake: None,
            keepalive,
            auth: None,
            attempt: 0,
            retry_at: None,
            intentional: false,
            connection_id: None,
        }
    }

    /// Run until every client handle is gone.
    pub(crate) async fn run(mut self) {
        let mut visibility = self.env.watch_visibility();
        let mut network = self.env.watch_network();
        let mut visibility_open = true;
        let mut network_open = true;

        debug!(subsystem = SUBSYSTEM_REALTIME, "Connection task started");

        loop {
            let connected = self.conn.is_some();
            let handshaking = self.handshake.is_some();
            let retry_at = self.retry_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                result = poll_handshake(&mut self.handshake), if handshaking => {
                    self.handshake = None;
                    self.handshake_finished(result).await;
                }
                frame = next_frame(&mut self.conn), if connected => {
                    self.handle_frame(frame).await;
                }
                _ = self.keepalive.tick(), if connected => {
                    self.send_keepalive().await;
                }
                _ = retry_timer(retry_at), if retry_at.is_some() => {
                    self.retry_at = None;
                    debug!(
                        subsystem = SUBSYSTEM_REALTIME,
                        attempt = self.attempt,
                        "Reconnect timer fired"
                    );
                    self.start_handshake();
                }
                changed = visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                    } else if *visibility.borrow_and_update() == Visibility::Visible {
                        self.environment_recovered("visible");
                    }
                }
                changed = network.changed(), if network_open => {
                    if changed.is_err() {
                        network_open = false;
                    } else if *network.borrow_and_update() == NetworkStatus::Online {
                        self.environment_recovered("online");
                    }
                }
            }
        }

        self.disconnect().await;
        debug!(subsystem = SUBSYSTEM_REALTIME, "Connection task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { auth } => self.connect(auth),
            Command::Disconnect { done } => {
                self.disconnect().await;
                let _ = done.send(());
            }
            Command::Join { topic } => self.join(topic).await,
            Command::Leave { topic } => self.leave(topic).await,
            Command::Send { message } => {
                if self.conn.is_some() {
                    self.transmit(&message).await;
                } else {
                    debug!(
                        subsystem = SUBSYSTEM_REALTIME,
                        state = %self.current_state(),
                        "Dropping outbound message while not connected"
                    );
                }
            }
            Command::Topics { reply } => {
                let _ = reply.send(self.topics.snapshot());
            }
        }
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Publish a state change. Repeating the current state emits nothing.
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(subsystem = SUBSYSTEM_REALTIME, state = %next, "Connection state changed");
            self.dispatcher.dispatch(&ClientEvent::status(next));
        }
    }

    fn connect(&mut self, auth: SessionAuth) {
        let state = self.current_state();
        if state != ConnectionState::Disconnected {
            debug!(subsystem = SUBSYSTEM_REALTIME, state = %state, "Connect ignored");
            return;
        }

        info!(
            subsystem = SUBSYSTEM_REALTIME,
            scope = auth.scope(),
            "Opening realtime connection"
        );
        self.auth = Some(auth);
        self.intentional = false;
        self.attempt = 0;
        self.set_state(ConnectionState::Connecting);
        self.start_handshake();
    }

    async fn disconnect(&mut self) {
        self.intentional = true;
        self.handshake = None;
        self.retry_at = None;
        self.attempt = 0;
        self.auth = None;
        self.topics.clear();

        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            info!(
                subsystem = SUBSYSTEM_REALTIME,
                connection_id = ?self.connection_id,
                "Realtime connection closed"
            );
        }
        self.connection_id = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn start_handshake(&mut self) {
        let Some(auth) = self.auth.clone() else {
            return;
        };
        let connector = Arc::clone(&self.connector);
        let timeout = self.connect_timeout;

        self.handshake = Some(
            async move {
                match tokio::time::timeout(timeout, connector.connect(&auth)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Transport(format!(
                        "handshake timed out after {}ms",
                        timeout.as_millis()
                    ))),
                }
            }
            .boxed(),
        );
    }

    async fn handshake_finished(&mut self, result: Result<Box<dyn Connection>>) {
        match result {
            Ok(conn) => self.established(conn).await,
            Err(err) => {
                warn!(
                    subsystem = SUBSYSTEM_REALTIME,
                    attempt = self.attempt,
                    error = %err,
                    "Realtime handshake failed"
                );
                self.schedule_retry();
            }
        }
    }

    async fn established(&mut self, conn: Box<dyn Connection>) {
        let connection_id = new_v7();
        let recovered_after = self.attempt;

        self.conn = Some(conn);
        self.connection_id = Some(connection_id);
        self.attempt = 0;
        self.retry_at = None;
        self.keepalive.reset();

        info!(
            subsystem = SUBSYSTEM_REALTIME,
            connection_id = %connection_id,
            attempt = recovered_after,
            topics = self.topics.len(),
            "Realtime connection established"
        );
        self.set_state(ConnectionState::Connected);

        for topic in self.topics.snapshot() {
            if self.conn.is_none() {
                break;
            }
            debug!(subsystem = SUBSYSTEM_REALTIME, topic_id = %topic, "Replaying topic join");
            self.transmit(&ClientMessage::join(topic)).await;
        }
    }

    /// Schedule the next reconnection attempt, or give up.
    fn schedule_retry(&mut self) {
        let attempt = self.attempt + 1;
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                self.attempt = attempt;
                self.retry_at = Some(Instant::now() + delay);
                info!(
                    subsystem = SUBSYSTEM_REALTIME,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.set_state(ConnectionState::Reconnecting);
            }
            None => {
                info!(
                    subsystem = SUBSYSTEM_REALTIME,
                    attempts = self.attempt,
                    "Reconnect attempts exhausted; giving up"
                );
                self.attempt = 0;
                self.retry_at = None;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Unsolicited loss of the live connection.
    async fn connection_lost(&mut self, reason: &str) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
        warn!(
            subsystem = SUBSYSTEM_REALTIME,
            connection_id = ?self.connection_id,
            reason,
            "Realtime connection lost"
        );
        self.connection_id = None;
        self.attempt = 0;
        self.schedule_retry();
    }

    async fn transmit(&mut self, message: &ClientMessage) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        match conn.send(message).await {
            Ok(()) => trace!(subsystem = SUBSYSTEM_REALTIME, ?message, "Sent frame"),
            Err(Error::Transport(reason)) => self.connection_lost(&reason).await,
            Err(err) => warn!(
                subsystem = SUBSYSTEM_REALTIME,
                error = %err,
                "Failed to encode outbound frame"
            ),
        }
    }

    async fn send_keepalive(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        if let Err(err) = conn.ping().await {
            self.connection_lost(&err.to_string()).await;
        }
    }

    async fn join(&mut self, topic: String) {
        if !self.topics.join(&topic) {
            debug!(subsystem = SUBSYSTEM_REALTIME, topic_id = %topic, "Already joined");
            return;
        }
        if self.conn.is_some() {
            self.transmit(&ClientMessage::join(topic)).await;
        } else {
            debug!(
                subsystem = SUBSYSTEM_REALTIME,
                topic_id = %topic,
                state = %self.current_state(),
                "Join deferred until connected"
            );
        }
    }

    async fn leave(&mut self, topic: String) {
        if !self.topics.leave(&topic) {
            return;
        }
        if self.conn.is_some() {
            self.transmit(&ClientMessage::leave(topic)).await;
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<ServerMessage>>) {
        match frame {
            None => self.connection_lost("closed by peer").await,
            Some(Err(Error::Transport(reason))) => self.connection_lost(&reason).await,
            Some(Err(err)) => {
                warn!(subsystem = SUBSYSTEM_REALTIME, error = %err, "Skipping malformed frame");
            }
            Some(Ok(message)) => self.deliver(message),
        }
    }

    fn deliver(&self, message: ServerMessage) {
        if let Some(topic) = message.topic() {
            if !self.topics.contains(topic) {
                debug!(
                    subsystem = SUBSYSTEM_REALTIME,
                    topic_id = topic,
                    "Discarding event for topic not joined"
                );
                return;
            }
        }
        let event = ClientEvent::from(message);
        trace!(subsystem = SUBSYSTEM_REALTIME, kind = %event.kind(), "Dispatching event");
        self.dispatcher.dispatch(&event);
    }

    /// Visibility or network recovery: reconnect only when fully settled.
    fn environment_recovered(&mut self, trigger: &str) {
        if self.current_state() != ConnectionState::Disconnected
            || self.intentional
            || self.auth.is_none()
        {
            return;
        }
        info!(
            subsystem = SUBSYSTEM_REALTIME,
            trigger,
            "Environment recovered; reconnecting"
        );
        self.set_state(ConnectionState::Connecting);
        self.start_handshake();
    }
}

async fn poll_handshake(slot: &mut Option<Handshake>) -> Result<Box<dyn Connection>> {
    match slot {
        Some(handshake) => handshake.await,
        None => pending().await,
    }
}

async fn next_frame(conn: &mut Option<Box<dyn Connection>>) -> Option<Result<ServerMessage>> {
    match conn {
        Some(conn) => conn.recv().await,
        None => pending().await,
    }
}

async fn retry_timer(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
