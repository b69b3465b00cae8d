//! Structured logging conventions for dealwire.
//!
//! Every crate tags its events with a `subsystem` field whose value comes from
//! the constants below, so log aggregation can split channel, dispatch, and
//! push traffic without parsing messages. Other field names are fixed by
//! convention: `topic_id`, `notification_id`, `connection_id`, `state`,
//! `attempt`, `delay_ms`, `endpoint`, `error`.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded delivery that needs operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (drop, sink failure, listener panic) |
//! | INFO  | Lifecycle events (connect, disconnect, reconnect success, terminal give-up) |
//! | DEBUG | Decision points (deferred join, skipped render, duplicate id) |
//! | TRACE | Per-frame traffic |

/// Connection task, state machine, and topic registry.
pub const SUBSYSTEM_REALTIME: &str = "realtime";

/// Event dispatcher and listener fan-out.
pub const SUBSYSTEM_DISPATCH: &str = "dispatch";

/// Push subscription management and the persistence sink.
pub const SUBSYSTEM_PUSH: &str = "push";

/// Local notification rendering and the notification router.
pub const SUBSYSTEM_RENDERER: &str = "renderer";
