//! # dealwire-core
//!
//! Core types and primitives for dealwire real-time delivery.
//!
//! This crate provides the records, wire messages, typed client events, and
//! the dispatch/de-duplication primitives that the realtime channel and the
//! push fallback share.

pub mod defaults;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod state;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use dispatcher::{DispatchOutcome, EventDispatcher, Listener, ListenerId};
pub use environment::{EnvironmentSignals, NetworkStatus, Visibility};
pub use error::{Error, Result};
pub use events::{ClientEvent, ClientMessage, EventKind, ServerMessage};
pub use ledger::{DeliveryLedger, DeliveryPath};
pub use models::{
    NotificationRecord, NotificationType, Priority, PushKeys, PushSubscription,
    PushSubscriptionRecord,
};
pub use state::ConnectionState;
pub use uuid_utils::new_v7;
