//! # dealwire-push
//!
//! Push fallback and local notification rendering for dealwire.
//!
//! When the realtime channel cannot reach a client, the server falls back to
//! platform push. This crate keeps the push subscription registered, renders
//! local notifications while the application is hidden, and makes sure a
//! notification delivered on both paths is shown once.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dealwire_push::{HttpSubscriptionSink, NotificationRouter, PushConfig, PushFallbackManager};
//!
//! let config = PushConfig::from_env();
//! let sink = Arc::new(HttpSubscriptionSink::from_config(&config)?.with_bearer(token));
//! let router = Arc::new(NotificationRouter::from_config(&config, surface, env));
//! let manager = PushFallbackManager::new(&config, platform, sink).with_router(router);
//!
//! if manager.request_permission().await.is_granted() {
//!     manager.subscribe("user-1", "org-1").await;
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod keys;
pub mod manager;
pub mod platform;
pub mod renderer;
pub mod router;
pub mod sink;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use capabilities::Capabilities;
pub use config::PushConfig;
pub use manager::PushFallbackManager;
pub use platform::{LocalNotification, NotificationSurface, Permission, PushPlatform};
pub use renderer::{LocalNotificationRenderer, NotificationOptions};
pub use router::{NotificationRouter, RouteOutcome};
pub use sink::{HttpSubscriptionSink, SubscriptionSink};
