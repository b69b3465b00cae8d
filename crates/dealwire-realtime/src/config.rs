//! Realtime client configuration.

use std::time::Duration;

use dealwire_core::defaults;

use crate::backoff::ReconnectPolicy;

/// Configuration for the realtime client.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint of the notification server.
    pub url: String,
    /// Delay before the first reconnection attempt; doubles per attempt.
    pub reconnect_base_delay: Duration,
    /// Reconnection attempts before settling in `Disconnected`.
    pub max_reconnect_attempts: u32,
    /// Interval between keepalive pings while connected.
    pub keepalive_interval: Duration,
    /// Upper bound on a single handshake.
    pub connect_timeout: Duration,
    /// Capacity of the client → connection task command channel.
    pub command_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: defaults::WS_URL.to_string(),
            reconnect_base_delay: Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS),
            max_reconnect_attempts: defaults::RECONNECT_MAX_ATTEMPTS,
            keepalive_interval: Duration::from_secs(defaults::KEEPALIVE_INTERVAL_SECS),
            connect_timeout: Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS),
            command_buffer: defaults::COMMAND_BUFFER,
        }
    }
}

impl RealtimeConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DEALWIRE_WS_URL` | `ws://127.0.0.1:3001/realtime` | Notification server endpoint |
    /// | `DEALWIRE_RECONNECT_BASE_MS` | `1000` | First reconnect delay |
    /// | `DEALWIRE_RECONNECT_MAX_ATTEMPTS` | `5` | Attempts before giving up |
    /// | `DEALWIRE_KEEPALIVE_SECS` | `30` | Keepalive ping interval |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DEALWIRE_WS_URL") {
            if !url.trim().is_empty() {
                config.url = url;
            }
        }

        if let Some(ms) = std::env::var("DEALWIRE_RECONNECT_BASE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.reconnect_base_delay = Duration::from_millis(ms.max(1));
        }

        if let Some(attempts) = std::env::var("DEALWIRE_RECONNECT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.max_reconnect_attempts = attempts;
        }

        if let Some(secs) = std::env::var("DEALWIRE_KEEPALIVE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.keepalive_interval = Duration::from_secs(secs.max(1));
        }

        config
    }

    /// Set the server endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the first reconnection delay.
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set the maximum number of reconnection attempts.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the keepalive ping interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_base_delay, self.max_reconnect_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol_constants() {
        let config = RealtimeConfig::default();
        assert_eq!(config.reconnect_base_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.url, defaults::WS_URL);
    }

    #[test]
    fn test_builder_setters() {
        let config = RealtimeConfig::default()
            .with_url("ws://example.test/ws")
            .with_reconnect_base_delay(Duration::from_millis(250))
            .with_max_reconnect_attempts(2)
            .with_keepalive_interval(Duration::from_secs(5))
            .with_connect_timeout(Duration::from_secs(1));

        assert_eq!(config.url, "ws://example.test/ws");
        assert_eq!(config.max_reconnect_attempts, 2);
        let policy = config.reconnect_policy();
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(3), None);
    }
}
