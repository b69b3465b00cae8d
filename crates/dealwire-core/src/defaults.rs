//! Centralized default constants for dealwire.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in the realtime and push crates start from these and let
//! environment variables override them.

// =============================================================================
// REALTIME CHANNEL
// =============================================================================

/// Default WebSocket endpoint of the notification server.
pub const WS_URL: &str = "ws://127.0.0.1:3001/realtime";

/// Delay before the first reconnection attempt, in milliseconds.
///
/// Attempt `n` waits `RECONNECT_BASE_DELAY_MS * 2^(n-1)`.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Reconnection attempts before the client settles in `Disconnected`.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Interval between transport-level keepalive pings, in seconds.
///
/// Matches the server's own 30s ping cadence.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Timeout for a single WebSocket handshake, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Capacity of the command channel between client handles and the
/// connection task.
pub const COMMAND_BUFFER: usize = 256;

/// Header carrying the organization scope at connect time.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

// =============================================================================
// PRESENCE
// =============================================================================

/// How long a typing indicator stays live without a refresh, in seconds.
pub const TYPING_TTL_SECS: u64 = 6;

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Default API base URL for the push subscription sink.
pub const API_URL: &str = "http://127.0.0.1:3000";

/// Sink path that registers a push subscription.
pub const PUSH_SUBSCRIBE_PATH: &str = "/api/push/subscribe";

/// Sink path that removes a push subscription.
pub const PUSH_UNSUBSCRIBE_PATH: &str = "/api/push/unsubscribe";

/// HTTP timeout for push sink requests, in seconds.
pub const PUSH_TIMEOUT_SECS: u64 = 10;

/// Local notifications close themselves after this many milliseconds
/// unless their priority is high.
pub const AUTO_DISMISS_MS: u64 = 5_000;

/// Number of notification ids remembered for de-duplication.
pub const LEDGER_CAPACITY: usize = 1_024;

/// Path prefix used when a notification click navigates to a deal.
pub const DEAL_ROUTE_PREFIX: &str = "/deals/";
