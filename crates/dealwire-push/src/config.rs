//! Push fallback configuration.

use std::time::Duration;

use dealwire_core::{defaults, Result};

use crate::keys::decode_vapid_key;

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Base URL of the persistence service that stores subscriptions.
    pub api_url: String,
    /// VAPID public key (base64url) used as the application server key.
    pub vapid_public_key: Option<String>,
    /// Timeout for sink requests.
    pub request_timeout: Duration,
    /// How long a non-high-priority local notification stays on screen.
    pub auto_dismiss: Duration,
    /// Notification ids remembered for de-duplication.
    pub ledger_capacity: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            vapid_public_key: None,
            request_timeout: Duration::from_secs(defaults::PUSH_TIMEOUT_SECS),
            auto_dismiss: Duration::from_millis(defaults::AUTO_DISMISS_MS),
            ledger_capacity: defaults::LEDGER_CAPACITY,
        }
    }
}

impl PushConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DEALWIRE_API_URL` | `http://127.0.0.1:3000` | Persistence service base URL |
    /// | `DEALWIRE_VAPID_PUBLIC_KEY` | (unset) | Application server key, base64url |
    /// | `DEALWIRE_PUSH_TIMEOUT_SECS` | `10` | Sink request timeout |
    /// | `DEALWIRE_AUTO_DISMISS_MS` | `5000` | Local notification lifetime |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DEALWIRE_API_URL") {
            if !url.trim().is_empty() {
                config.api_url = url;
            }
        }

        config.vapid_public_key = std::env::var("DEALWIRE_VAPID_PUBLIC_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        if let Some(secs) = std::env::var("DEALWIRE_PUSH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        if let Some(ms) = std::env::var("DEALWIRE_AUTO_DISMISS_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.auto_dismiss = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_vapid_public_key(mut self, key: impl Into<String>) -> Self {
        self.vapid_public_key = Some(key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_auto_dismiss(mut self, after: Duration) -> Self {
        self.auto_dismiss = after;
        self
    }

    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger_capacity = capacity;
        self
    }

    /// Decoded VAPID key, `None` when not configured.
    pub fn application_server_key(&self) -> Result<Option<Vec<u8>>> {
        self.vapid_public_key
            .as_deref()
            .map(decode_vapid_key)
            .transpose()
    }
}
