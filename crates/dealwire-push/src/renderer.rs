//! Local notification rendering.
//!
//! Last-resort display for notifications while the document is hidden.
//! Each notification carries a tag: showing the same tag again replaces the
//! previous one instead of stacking. Non-high-priority notifications close
//! themselves after `auto_dismiss`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use dealwire_core::defaults::{AUTO_DISMISS_MS, DEAL_ROUTE_PREFIX};
use dealwire_core::logging::SUBSYSTEM_RENDERER;
use dealwire_core::{new_v7, NotificationRecord, Priority};

use crate::platform::{LocalNotification, NotificationSurface};

/// Per-call options for [`LocalNotificationRenderer::show`].
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    /// Explicit de-duplication tag.
    pub tag: Option<String>,
    /// Used as the tag when `tag` is unset.
    pub notification_id: Option<String>,
    pub priority: Priority,
    /// Deal to open when the notification is clicked.
    pub deal_id: Option<String>,
    pub icon: Option<String>,
}

impl NotificationOptions {
    pub fn for_record(record: &NotificationRecord) -> Self {
        Self {
            tag: None,
            notification_id: Some(record.id.clone()),
            priority: record.priority,
            deal_id: record.referenced_deal().map(str::to_string),
            icon: None,
        }
    }
}

struct Shown {
    generation: u64,
    deal_id: Option<String>,
    dismiss: Option<JoinHandle<()>>,
}

type ShownMap = Arc<Mutex<HashMap<String, Shown>>>;

fn lock(shown: &ShownMap) -> MutexGuard<'_, HashMap<String, Shown>> {
    shown.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LocalNotificationRenderer {
    surface: Arc<dyn NotificationSurface>,
    auto_dismiss: Duration,
    generation: AtomicU64,
    shown: ShownMap,
}

impl LocalNotificationRenderer {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self::with_auto_dismiss(surface, Duration::from_millis(AUTO_DISMISS_MS))
    }

    pub fn with_auto_dismiss(
        surface: Arc<dyn NotificationSurface>,
        auto_dismiss: Duration,
    ) -> Self {
        Self {
            surface,
            auto_dismiss,
            generation: AtomicU64::new(0),
            shown: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `show` would display anything right now.
    pub fn can_render(&self) -> bool {
        self.surface.permission().is_granted()
    }

    /// Display a notification. Returns the tag used, or `None` when nothing
    /// was shown.
    pub fn show(&self, title: &str, body: &str, options: NotificationOptions) -> Option<String> {
        let permission = self.surface.permission();
        if !permission.is_granted() {
            debug!(
                subsystem = SUBSYSTEM_RENDERER,
                %permission,
                "Skipping local notification without permission"
            );
            return None;
        }

        let tag = options
            .tag
            .or(options.notification_id)
            .unwrap_or_else(|| new_v7().to_string());
        let persistent = options.priority == Priority::High;

        // Replace, don't stack: close the old handle and cancel its timer.
        if let Some(previous) = lock(&self.shown).remove(&tag) {
            if let Some(timer) = previous.dismiss {
                timer.abort();
            }
            self.surface.close(&tag);
            debug!(subsystem = SUBSYSTEM_RENDERER, tag = %tag, "Replacing notification");
        }

        let notification = LocalNotification {
            tag: tag.clone(),
            title: title.to_string(),
            body: body.to_string(),
            priority: options.priority,
            require_interaction: persistent,
            icon: options.icon,
            deal_id: options.deal_id.clone(),
        };
        if let Err(err) = self.surface.display(&notification) {
            warn!(
                subsystem = SUBSYSTEM_RENDERER,
                tag = %tag,
                error = %err,
                "Failed to display local notification"
            );
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let dismiss = if persistent {
            None
        } else {
            self.schedule_dismiss(&tag, generation)
        };
        lock(&self.shown).insert(
            tag.clone(),
            Shown {
                generation,
                deal_id: options.deal_id,
                dismiss,
            },
        );

        debug!(
            subsystem = SUBSYSTEM_RENDERER,
            tag = %tag,
            priority = %options.priority,
            "Local notification shown"
        );
        Some(tag)
    }

    /// Display a server notification, tagged by its id.
    pub fn show_record(&self, record: &NotificationRecord) -> Option<String> {
        self.show(
            &record.title,
            &record.message,
            NotificationOptions::for_record(record),
        )
    }

    fn schedule_dismiss(&self, tag: &str, generation: u64) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                subsystem = SUBSYSTEM_RENDERER,
                tag,
                "No async runtime; notification will not auto-dismiss"
            );
            return None;
        };

        let shown = Arc::clone(&self.shown);
        let surface = Arc::clone(&self.surface);
        let tag = tag.to_string();
        let after = self.auto_dismiss;

        Some(runtime.spawn(async move {
            tokio::time::sleep(after).await;
            let expired = {
                let mut map = lock(&shown);
                match map.get(&tag) {
                    Some(entry) if entry.generation == generation => map.remove(&tag).is_some(),
                    _ => false,
                }
            };
            if expired {
                surface.close(&tag);
                debug!(subsystem = SUBSYSTEM_RENDERER, tag = %tag, "Notification auto-dismissed");
            }
        }))
    }

    /// User clicked the notification with `tag`.
    ///
    /// Always focuses the application; opens the referenced deal if any;
    /// then dismisses. Returns `true` if the tag was still shown.
    pub fn handle_click(&self, tag: &str) -> bool {
        self.surface.focus_app();

        let entry = lock(&self.shown).remove(tag);
        let known = entry.is_some();
        if let Some(entry) = entry {
            if let Some(timer) = entry.dismiss {
                timer.abort();
            }
            if let Some(deal_id) = entry.deal_id {
                let route = format!("{}{}", DEAL_ROUTE_PREFIX, deal_id);
                debug!(subsystem = SUBSYSTEM_RENDERER, tag, route = %route, "Opening deal");
                self.surface.navigate(&route);
            }
        }

        self.surface.close(tag);
        known
    }

    /// Close the notification with `tag`. Returns `true` if it was shown.
    pub fn dismiss(&self, tag: &str) -> bool {
        let Some(entry) = lock(&self.shown).remove(tag) else {
            return false;
        };
        if let Some(timer) = entry.dismiss {
            timer.abort();
        }
        self.surface.close(tag);
        true
    }

    pub fn is_shown(&self, tag: &str) -> bool {
        lock(&self.shown).contains_key(tag)
    }

    /// Tags currently on screen, sorted.
    pub fn active_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = lock(&self.shown).keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl std::fmt::Debug for LocalNotificationRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNotificationRenderer")
            .field("auto_dismiss", &self.auto_dismiss)
            .field("shown", &lock(&self.shown).len())
            .finish()
    }
}
