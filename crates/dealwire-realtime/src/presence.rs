//! Who is typing where, and what each user did last.
//!
//! Fed by `user_typing` and `user_activity` events. Typing entries expire
//! after `typing_ttl` without a refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use dealwire_core::defaults::TYPING_TTL_SECS;
use dealwire_core::{ClientEvent, EventDispatcher, EventKind, ListenerId};

#[derive(Default)]
struct Presence {
    /// topic → user → last `is_typing: true`
    typing: HashMap<String, HashMap<String, Instant>>,
    activity: HashMap<String, Value>,
}

pub struct PresenceTracker {
    typing_ttl: Duration,
    inner: Mutex<Presence>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(TYPING_TTL_SECS))
    }
}

impl PresenceTracker {
    pub fn new(typing_ttl: Duration) -> Self {
        Self {
            typing_ttl,
            inner: Mutex::new(Presence::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Presence> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register as a listener for typing and activity events.
    pub fn attach(self: &Arc<Self>, dispatcher: &EventDispatcher) -> [ListenerId; 2] {
        let typing = Arc::clone(self);
        let activity = Arc::clone(self);
        [
            dispatcher.on(EventKind::UserTyping, move |event| typing.observe(event)),
            dispatcher.on(EventKind::UserActivity, move |event| activity.observe(event)),
        ]
    }

    pub fn observe(&self, event: &ClientEvent) {
        match event {
            ClientEvent::UserTyping {
                user_id,
                topic_id,
                is_typing,
            } => {
                let mut presence = self.lock();
                if *is_typing {
                    presence
                        .typing
                        .entry(topic_id.clone())
                        .or_default()
                        .insert(user_id.clone(), Instant::now());
                } else if let Some(users) = presence.typing.get_mut(topic_id) {
                    users.remove(user_id);
                    if users.is_empty() {
                        presence.typing.remove(topic_id);
                    }
                }
            }
            ClientEvent::UserActivity { user_id, activity } => {
                self.lock()
                    .activity
                    .insert(user_id.clone(), activity.clone());
            }
            _ => {}
        }
    }

    /// Users currently typing in `topic`, sorted.
    pub fn typing_in(&self, topic: &str) -> Vec<String> {
        let now = Instant::now();
        let presence = self.lock();
        let mut users: Vec<String> = presence
            .typing
            .get(topic)
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, since)| now.duration_since(**since) < self.typing_ttl)
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .unwrap_or_default();
        users.sort();
        users
    }

    pub fn last_activity(&self, user_id: &str) -> Option<Value> {
        self.lock().activity.get(user_id).cloned()
    }

    /// Users with any recorded activity, sorted.
    pub fn active_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.lock().activity.keys().cloned().collect();
        users.sort();
        users
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let presence = self.lock();
        f.debug_struct("PresenceTracker")
            .field("typing_ttl", &self.typing_ttl)
            .field("typing_topics", &presence.typing.len())
            .field("active_users", &presence.activity.len())
            .finish()
    }
}
