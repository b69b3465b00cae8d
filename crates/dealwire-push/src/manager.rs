//! Push Fallback Manager.
//!
//! Keeps this installation's platform push subscription registered with the
//! server so notifications still arrive while the realtime channel cannot
//! reach the client. Every operation fails soft: errors are logged and
//! reported as `None`/`false`, never returned to the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use dealwire_core::logging::SUBSYSTEM_PUSH;
use dealwire_core::{NotificationRecord, PushSubscriptionRecord};

use crate::capabilities::Capabilities;
use crate::config::PushConfig;
use crate::keys::validate_subscription;
use crate::platform::{Permission, PushPlatform};
use crate::router::{NotificationRouter, RouteOutcome};
use crate::sink::SubscriptionSink;

pub struct PushFallbackManager {
    platform: Arc<dyn PushPlatform>,
    sink: Arc<dyn SubscriptionSink>,
    capabilities: Capabilities,
    application_server_key: Option<Vec<u8>>,
    router: Option<Arc<NotificationRouter>>,
    registered: Mutex<Option<PushSubscriptionRecord>>,
}

impl PushFallbackManager {
    /// Build a manager. Platform capabilities are probed here, once.
    ///
    /// An unparseable VAPID key is logged and treated as absent: existing
    /// subscriptions still work, new ones cannot be created.
    pub fn new(
        config: &PushConfig,
        platform: Arc<dyn PushPlatform>,
        sink: Arc<dyn SubscriptionSink>,
    ) -> Self {
        let capabilities = platform.capabilities();
        let application_server_key = match config.application_server_key() {
            Ok(key) => key,
            Err(err) => {
                warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Ignoring invalid VAPID key");
                None
            }
        };

        debug!(
            subsystem = SUBSYSTEM_PUSH,
            push = capabilities.push,
            notifications = capabilities.notifications,
            "Push capabilities probed"
        );

        Self {
            platform,
            sink,
            capabilities,
            application_server_key,
            router: None,
            registered: Mutex::new(None),
        }
    }

    /// Route server-pushed notifications through `router`.
    pub fn with_router(mut self, router: Arc<NotificationRouter>) -> Self {
        self.router = Some(router);
        self
    }

    fn registered(&self) -> MutexGuard<'_, Option<PushSubscriptionRecord>> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether push delivery is possible on this platform.
    pub fn is_supported(&self) -> bool {
        self.capabilities.supports_push()
    }

    pub fn permission(&self) -> Permission {
        if !self.is_supported() {
            return Permission::Denied;
        }
        self.platform.permission()
    }

    /// The record last accepted by the server, if any.
    pub fn current_registration(&self) -> Option<PushSubscriptionRecord> {
        self.registered().clone()
    }

    /// Ask the user for notification permission.
    ///
    /// Never prompts again after a denial. A prompt closed without a
    /// decision comes back as [`Permission::Dismissed`] and may be asked
    /// again later.
    pub async fn request_permission(&self) -> Permission {
        if !self.is_supported() {
            debug!(subsystem = SUBSYSTEM_PUSH, "Push unsupported; not prompting");
            return Permission::Denied;
        }

        match self.platform.permission() {
            Permission::Default | Permission::Dismissed => {}
            decided => return decided,
        }

        match self.platform.request_permission().await {
            Ok(Permission::Default | Permission::Dismissed) => {
                info!(subsystem = SUBSYSTEM_PUSH, "Permission prompt dismissed");
                Permission::Dismissed
            }
            Ok(answer) => {
                info!(subsystem = SUBSYSTEM_PUSH, permission = %answer, "Permission prompt answered");
                answer
            }
            Err(err) => {
                warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Permission prompt failed");
                Permission::Default
            }
        }
    }

    /// Ensure a platform subscription exists and register it with the server.
    ///
    /// Returns `None` without contacting the server when push is unsupported
    /// or permission is not granted, and on any failure.
    pub async fn subscribe(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Option<PushSubscriptionRecord> {
        if !self.is_supported() {
            debug!(subsystem = SUBSYSTEM_PUSH, "Push unsupported; not subscribing");
            return None;
        }
        let permission = self.platform.permission();
        if !permission.is_granted() {
            debug!(subsystem = SUBSYSTEM_PUSH, %permission, "Permission not granted; not subscribing");
            return None;
        }

        let existing = match self.platform.get_subscription().await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Failed to read push subscription");
                return None;
            }
        };

        let subscription = match existing {
            Some(subscription) => subscription,
            None => {
                let Some(key) = self.application_server_key.as_deref() else {
                    warn!(subsystem = SUBSYSTEM_PUSH, "No VAPID key configured; cannot subscribe");
                    return None;
                };
                match self.platform.subscribe(key).await {
                    Ok(subscription) => subscription,
                    Err(err) => {
                        warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Platform subscribe failed");
                        return None;
                    }
                }
            }
        };

        if let Err(err) = validate_subscription(&subscription) {
            warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Rejecting malformed push subscription");
            return None;
        }

        let record = PushSubscriptionRecord::new(subscription, user_id, organization_id);
        if let Err(err) = self.sink.register(&record).await {
            warn!(
                subsystem = SUBSYSTEM_PUSH,
                endpoint = %record.endpoint,
                error = %err,
                "Failed to register push subscription"
            );
            return None;
        }

        info!(
            subsystem = SUBSYSTEM_PUSH,
            endpoint = %record.endpoint,
            user_id,
            organization_id,
            "Push subscription registered"
        );
        *self.registered() = Some(record.clone());
        Some(record)
    }

    /// Cancel the platform subscription and ask the server to forget it.
    ///
    /// Returns `true` on success, including when there was nothing to do.
    pub async fn unsubscribe(&self) -> bool {
        if !self.is_supported() {
            return true;
        }

        let subscription = match self.platform.get_subscription().await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                self.registered().take();
                return true;
            }
            Err(err) => {
                warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Failed to read push subscription");
                return false;
            }
        };

        if let Err(err) = self.platform.unsubscribe().await {
            warn!(subsystem = SUBSYSTEM_PUSH, error = %err, "Platform unsubscribe failed");
            return false;
        }
        self.registered().take();

        match self.sink.remove(&subscription.endpoint).await {
            Ok(()) => {
                info!(
                    subsystem = SUBSYSTEM_PUSH,
                    endpoint = %subscription.endpoint,
                    "Push subscription removed"
                );
                true
            }
            Err(err) => {
                warn!(
                    subsystem = SUBSYSTEM_PUSH,
                    endpoint = %subscription.endpoint,
                    error = %err,
                    "Failed to remove push subscription from server"
                );
                false
            }
        }
    }

    /// A notification delivered by the push service.
    pub fn handle_push(&self, record: &NotificationRecord) -> Option<RouteOutcome> {
        let Some(router) = &self.router else {
            debug!(
                subsystem = SUBSYSTEM_PUSH,
                notification_id = %record.id,
                "No router attached; dropping pushed notification"
            );
            return None;
        };
        Some(router.deliver_push(record))
    }
}

impl std::fmt::Debug for PushFallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushFallbackManager")
            .field("capabilities", &self.capabilities)
            .field("has_vapid_key", &self.application_server_key.is_some())
            .field("registered", &self.registered().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    use dealwire_core::{Error, Result};

    use crate::mock::{sample_subscription, MockPushPlatform};

    #[derive(Default)]
    struct CountingSink {
        registers: AtomicUsize,
        removes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SubscriptionSink for CountingSink {
        async fn register(&self, _record: &PushSubscriptionRecord) -> Result<()> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Request("sink down".to_string()));
            }
            Ok(())
        }

        async fn remove(&self, _endpoint: &str) -> Result<()> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Request("sink down".to_string()));
            }
            Ok(())
        }
    }

    fn config() -> PushConfig {
        PushConfig::default().with_vapid_public_key(URL_SAFE_NO_PAD.encode([4u8; 65]))
    }

    fn manager(
        platform: &Arc<MockPushPlatform>,
        sink: &Arc<CountingSink>,
    ) -> PushFallbackManager {
        let dyn_platform: Arc<dyn PushPlatform> = platform.clone();
        let dyn_sink: Arc<dyn SubscriptionSink> = sink.clone();
        PushFallbackManager::new(&config(), dyn_platform, dyn_sink)
    }

    #[tokio::test]
    async fn test_denied_permission_never_touches_sink() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Denied));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert_eq!(sink.registers.load(Ordering::SeqCst), 0);
        assert_eq!(platform.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_denial_is_never_reprompted() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Default));
        platform.answer_prompt_with(Permission::Denied);
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert_eq!(manager.request_permission().await, Permission::Denied);
        assert_eq!(manager.request_permission().await, Permission::Denied);
        assert_eq!(platform.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_dismissed_prompt_can_be_asked_again() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Default));
        platform.answer_prompt_with(Permission::Dismissed);
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert_eq!(manager.request_permission().await, Permission::Dismissed);
        assert_eq!(manager.permission(), Permission::Default);
        platform.answer_prompt_with(Permission::Granted);
        assert_eq!(manager.request_permission().await, Permission::Granted);
        assert_eq!(platform.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::none(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert!(!manager.is_supported());
        assert_eq!(manager.request_permission().await, Permission::Denied);
        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert!(manager.unsubscribe().await);
        assert_eq!(platform.prompt_count(), 0);
        assert_eq!(sink.registers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribe_creates_and_registers() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        let record = manager.subscribe("u-1", "org-1").await.unwrap();
        assert_eq!(record.user_id, "u-1");
        assert_eq!(record.organization_id, "org-1");
        assert_eq!(platform.subscribe_count(), 1);
        assert_eq!(platform.last_application_server_key().unwrap(), vec![4u8; 65]);
        assert_eq!(sink.registers.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current_registration(), Some(record));
    }

    #[tokio::test]
    async fn test_subscribe_reuses_existing_subscription() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        platform.set_subscription(Some(sample_subscription("https://push.example.test/send/old")));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        let first = manager.subscribe("u-1", "org-1").await.unwrap();
        let second = manager.subscribe("u-1", "org-1").await.unwrap();

        assert_eq!(first.endpoint, "https://push.example.test/send/old");
        assert_eq!(first, second);
        assert_eq!(platform.subscribe_count(), 0);
        assert_eq!(sink.registers.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_leaves_prior_state() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink {
            fail: true,
            ..Default::default()
        });
        let manager = manager(&platform, &sink);

        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert!(manager.current_registration().is_none());
    }

    #[tokio::test]
    async fn test_platform_failure_is_soft() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        platform.fail_subscribe(true);
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert_eq!(sink.registers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_keys_are_not_registered() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let mut bad = sample_subscription("https://push.example.test/send/bad");
        bad.keys.auth = "not base64!".to_string();
        platform.set_subscription(Some(bad));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert_eq!(sink.registers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_vapid_key_cannot_create() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let dyn_platform: Arc<dyn PushPlatform> = platform.clone();
        let dyn_sink: Arc<dyn SubscriptionSink> = sink.clone();
        let manager = PushFallbackManager::new(&PushConfig::default(), dyn_platform, dyn_sink);

        assert!(manager.subscribe("u-1", "org-1").await.is_none());
        assert_eq!(platform.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        // Nothing to do is success.
        assert!(manager.unsubscribe().await);
        assert_eq!(sink.removes.load(Ordering::SeqCst), 0);

        manager.subscribe("u-1", "org-1").await.unwrap();
        assert!(manager.unsubscribe().await);
        assert!(platform.current_subscription().is_none());
        assert!(manager.current_registration().is_none());
        assert_eq!(sink.removes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_platform_failure() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);
        manager.subscribe("u-1", "org-1").await.unwrap();

        platform.fail_unsubscribe(true);
        assert!(!manager.unsubscribe().await);
        assert!(manager.current_registration().is_some());
        assert_eq!(sink.removes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_push_without_router() {
        let platform = Arc::new(MockPushPlatform::new(Capabilities::full(), Permission::Granted));
        let sink = Arc::new(CountingSink::default());
        let manager = manager(&platform, &sink);

        let record: NotificationRecord = serde_json::from_value(serde_json::json!({
            "id": "n-1",
            "type": "system",
            "title": "Maintenance",
            "message": "Tonight",
            "organizationId": "org-1",
            "timestamp": "2026-03-01T12:00:00Z"
        }))
        .unwrap();
        assert!(manager.handle_push(&record).is_none());
    }
}
