//! # dealwire-realtime
//!
//! Persistent realtime channel to the dealwire notification server.
//!
//! [`RealtimeClient`] keeps one authenticated connection per session,
//! recovers from drops with bounded exponential backoff, replays topic
//! membership after every reconnect and fans inbound events out to typed
//! listeners.
//!
//! ```ignore
//! let client = RealtimeClient::new(RealtimeConfig::from_env(), EnvironmentSignals::default());
//! client.on(EventKind::PipelineChanged, |event| println!("{:?}", event));
//! client.connect(token, organization_id).await?;
//! client.join("deal-42").await?;
//! ```

pub mod backoff;
pub mod client;
pub mod config;
mod connection;
pub mod presence;
pub mod topics;
pub mod transport;
pub mod ws;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backoff::ReconnectPolicy;
pub use client::RealtimeClient;
pub use config::RealtimeConfig;
pub use presence::PresenceTracker;
pub use topics::TopicRegistry;
pub use transport::{Connection, Connector, SessionAuth};
pub use ws::{WsConnection, WsConnector};
