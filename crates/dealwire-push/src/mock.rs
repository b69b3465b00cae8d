//! In-memory platform fakes for testing.
//!
//! Enable with `features = ["mock"]` or use from this crate's unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use dealwire_core::{Error, PushKeys, PushSubscription, Result};

use crate::capabilities::Capabilities;
use crate::platform::{LocalNotification, NotificationSurface, Permission, PushPlatform};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A well-formed subscription for `endpoint`.
pub fn sample_subscription(endpoint: &str) -> PushSubscription {
    let mut p256dh = [7u8; 65];
    p256dh[0] = 0x04;
    PushSubscription {
        endpoint: endpoint.to_string(),
        keys: PushKeys {
            p256dh: URL_SAFE_NO_PAD.encode(p256dh),
            auth: URL_SAFE_NO_PAD.encode([9u8; 16]),
        },
    }
}

/// Push platform whose state is set from the test body.
pub struct MockPushPlatform {
    capabilities: Capabilities,
    permission: Mutex<Permission>,
    prompt_answer: Mutex<Permission>,
    prompts: AtomicUsize,
    subscription: Mutex<Option<PushSubscription>>,
    subscribe_calls: AtomicUsize,
    last_key: Mutex<Option<Vec<u8>>>,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
}

impl MockPushPlatform {
    pub fn new(capabilities: Capabilities, permission: Permission) -> Self {
        Self {
            capabilities,
            permission: Mutex::new(permission),
            prompt_answer: Mutex::new(Permission::Granted),
            prompts: AtomicUsize::new(0),
            subscription: Mutex::new(None),
            subscribe_calls: AtomicUsize::new(0),
            last_key: Mutex::new(None),
            fail_subscribe: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
        }
    }

    /// What the user answers when prompted.
    pub fn answer_prompt_with(&self, answer: Permission) {
        *lock(&self.prompt_answer) = answer;
    }

    pub fn set_permission(&self, permission: Permission) {
        *lock(&self.permission) = permission;
    }

    pub fn set_subscription(&self, subscription: Option<PushSubscription>) {
        *lock(&self.subscription) = subscription;
    }

    pub fn current_subscription(&self) -> Option<PushSubscription> {
        lock(&self.subscription).clone()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn last_application_server_key(&self) -> Option<Vec<u8>> {
        lock(&self.last_key).clone()
    }
}

#[async_trait]
impl PushPlatform for MockPushPlatform {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn permission(&self) -> Permission {
        *lock(&self.permission)
    }

    async fn request_permission(&self) -> Result<Permission> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let answer = *lock(&self.prompt_answer);
        if answer != Permission::Dismissed {
            *lock(&self.permission) = answer;
        }
        Ok(answer)
    }

    async fn get_subscription(&self) -> Result<Option<PushSubscription>> {
        Ok(lock(&self.subscription).clone())
    }

    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_key) = Some(application_server_key.to_vec());
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Push("push service unavailable".to_string()));
        }
        let subscription = sample_subscription("https://push.example.test/send/new");
        *lock(&self.subscription) = Some(subscription.clone());
        Ok(subscription)
    }

    async fn unsubscribe(&self) -> Result<bool> {
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(Error::Push("unsubscribe failed".to_string()));
        }
        Ok(lock(&self.subscription).take().is_some())
    }
}

/// Observable effect on a [`MockSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Display(String),
    Close(String),
    Focus,
    Navigate(String),
}

/// Notification surface that records every call.
pub struct MockSurface {
    permission: Mutex<Permission>,
    fail_display: AtomicBool,
    calls: Mutex<Vec<SurfaceCall>>,
    displayed: Mutex<Vec<LocalNotification>>,
}

impl MockSurface {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            fail_display: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            displayed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_permission(&self, permission: Permission) {
        *lock(&self.permission) = permission;
    }

    pub fn fail_display(&self, fail: bool) {
        self.fail_display.store(fail, Ordering::SeqCst);
    }

    /// Every notification ever displayed, in order.
    pub fn displayed(&self) -> Vec<LocalNotification> {
        lock(&self.displayed).clone()
    }

    /// Tags passed to `close`, in order.
    pub fn closed(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Close(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take_calls(&self) -> Vec<SurfaceCall> {
        std::mem::take(&mut *lock(&self.calls))
    }
}

impl NotificationSurface for MockSurface {
    fn permission(&self) -> Permission {
        *lock(&self.permission)
    }

    fn display(&self, notification: &LocalNotification) -> Result<()> {
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(Error::Internal("surface rejected notification".to_string()));
        }
        lock(&self.calls).push(SurfaceCall::Display(notification.tag.clone()));
        lock(&self.displayed).push(notification.clone());
        Ok(())
    }

    fn close(&self, tag: &str) {
        lock(&self.calls).push(SurfaceCall::Close(tag.to_string()));
    }

    fn focus_app(&self) {
        lock(&self.calls).push(SurfaceCall::Focus);
    }

    fn navigate(&self, path: &str) {
        lock(&self.calls).push(SurfaceCall::Navigate(path.to_string()));
    }
}
