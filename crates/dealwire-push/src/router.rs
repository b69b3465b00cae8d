//! Routes notifications from both delivery paths to at most one render.
//!
//! A notification may arrive over the realtime channel, through the push
//! service, or both. The router records every id in a shared
//! [`DeliveryLedger`] and renders a local notification only while the
//! document is hidden, and only once per id. An id the application already
//! showed in-app is never rendered.

use std::sync::Arc;

use tracing::debug;

use dealwire_core::logging::SUBSYSTEM_RENDERER;
use dealwire_core::{
    ClientEvent, DeliveryLedger, DeliveryPath, EnvironmentSignals, EventDispatcher, EventKind,
    ListenerId, NotificationRecord,
};

use crate::config::PushConfig;
use crate::platform::NotificationSurface;
use crate::renderer::LocalNotificationRenderer;

/// What happened to a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Shown as a local notification.
    Rendered,
    /// Recorded; the document is visible so the application shows it.
    Visible,
    /// Already delivered on some path.
    Duplicate,
    /// Hidden, but the renderer cannot show anything.
    Suppressed,
}

#[derive(Debug)]
pub struct NotificationRouter {
    ledger: Arc<DeliveryLedger>,
    renderer: Arc<LocalNotificationRenderer>,
    env: EnvironmentSignals,
}

impl NotificationRouter {
    pub fn new(renderer: Arc<LocalNotificationRenderer>, env: EnvironmentSignals) -> Self {
        Self::with_ledger(renderer, env, Arc::new(DeliveryLedger::default()))
    }

    pub fn with_ledger(
        renderer: Arc<LocalNotificationRenderer>,
        env: EnvironmentSignals,
        ledger: Arc<DeliveryLedger>,
    ) -> Self {
        Self {
            ledger,
            renderer,
            env,
        }
    }

    /// Router with a renderer and ledger sized from `config`.
    pub fn from_config(
        config: &PushConfig,
        surface: Arc<dyn NotificationSurface>,
        env: EnvironmentSignals,
    ) -> Self {
        let renderer = Arc::new(LocalNotificationRenderer::with_auto_dismiss(
            surface,
            config.auto_dismiss,
        ));
        let ledger = Arc::new(DeliveryLedger::new(config.ledger_capacity));
        Self::with_ledger(renderer, env, ledger)
    }

    pub fn ledger(&self) -> &Arc<DeliveryLedger> {
        &self.ledger
    }

    pub fn renderer(&self) -> &Arc<LocalNotificationRenderer> {
        &self.renderer
    }

    /// A notification arrived over the realtime channel.
    pub fn deliver_realtime(&self, record: &NotificationRecord) -> RouteOutcome {
        self.deliver(record, DeliveryPath::Realtime)
    }

    /// A notification arrived through the push service.
    pub fn deliver_push(&self, record: &NotificationRecord) -> RouteOutcome {
        self.deliver(record, DeliveryPath::Push)
    }

    fn deliver(&self, record: &NotificationRecord, path: DeliveryPath) -> RouteOutcome {
        self.ledger.record(&record.id, path);
        if self.ledger.is_delivered(&record.id) {
            debug!(
                subsystem = SUBSYSTEM_RENDERER,
                notification_id = %record.id,
                ?path,
                first_path = ?self.ledger.first_path(&record.id),
                "Duplicate delivery skipped"
            );
            return RouteOutcome::Duplicate;
        }
        if !self.env.is_hidden() {
            self.ledger.mark_seen_in_app(&record.id, path);
            return RouteOutcome::Visible;
        }
        self.render(record, path)
    }

    fn render(&self, record: &NotificationRecord, path: DeliveryPath) -> RouteOutcome {
        if !self.renderer.can_render() {
            return RouteOutcome::Suppressed;
        }
        if !self.ledger.claim_render(&record.id, path) {
            return RouteOutcome::Duplicate;
        }
        match self.renderer.show_record(record) {
            Some(_) => RouteOutcome::Rendered,
            None => {
                self.ledger.release_render(&record.id);
                RouteOutcome::Suppressed
            }
        }
    }

    /// Feed realtime `notification` events into the router.
    pub fn attach(self: &Arc<Self>, dispatcher: &EventDispatcher) -> ListenerId {
        let router = Arc::clone(self);
        dispatcher.on(EventKind::Notification, move |event| {
            if let ClientEvent::Notification(record) = event {
                let outcome = router.deliver_realtime(record);
                debug!(
                    subsystem = SUBSYSTEM_RENDERER,
                    notification_id = %record.id,
                    ?outcome,
                    "Realtime notification routed"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use dealwire_core::{NotificationType, Priority, Visibility};

    use crate::mock::MockSurface;
    use crate::platform::Permission;

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            kind: NotificationType::PipelineChange,
            title: "Stage moved".to_string(),
            message: "Acme moved to negotiation".to_string(),
            deal_id: Some("deal-42".to_string()),
            user_id: None,
            organization_id: "org-1".to_string(),
            timestamp: Utc::now(),
            payload: None,
            read: false,
            priority: Priority::Medium,
        }
    }

    fn router(
        permission: Permission,
    ) -> (Arc<NotificationRouter>, Arc<MockSurface>, EnvironmentSignals) {
        let surface = Arc::new(MockSurface::new(permission));
        let dyn_surface: Arc<dyn NotificationSurface> = surface.clone();
        let renderer = Arc::new(LocalNotificationRenderer::new(dyn_surface));
        let env = EnvironmentSignals::default();
        let router = Arc::new(NotificationRouter::new(renderer, env.clone()));
        (router, surface, env)
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_realtime_never_renders() {
        let (router, surface, _env) = router(Permission::Granted);

        assert_eq!(router.deliver_realtime(&record("n-1")), RouteOutcome::Visible);
        assert!(surface.displayed().is_empty());
        assert!(router.ledger().contains("n-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_then_push_renders_once() {
        let (router, surface, env) = router(Permission::Granted);
        env.set_visibility(Visibility::Hidden);

        assert_eq!(router.deliver_realtime(&record("n-1")), RouteOutcome::Rendered);
        assert_eq!(router.deliver_push(&record("n-1")), RouteOutcome::Duplicate);
        assert_eq!(router.deliver_realtime(&record("n-1")), RouteOutcome::Duplicate);
        assert_eq!(surface.displayed().len(), 1);
        assert_eq!(surface.displayed()[0].tag, "n-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_then_realtime_renders_once() {
        let (router, surface, env) = router(Permission::Granted);
        env.set_visibility(Visibility::Hidden);

        assert_eq!(router.deliver_push(&record("n-2")), RouteOutcome::Rendered);
        assert_eq!(router.deliver_realtime(&record("n-2")), RouteOutcome::Duplicate);
        assert_eq!(surface.displayed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_delivery_suppresses_later_push() {
        let (router, surface, env) = router(Permission::Granted);

        router.deliver_realtime(&record("n-3"));
        env.set_visibility(Visibility::Hidden);
        assert_eq!(router.deliver_push(&record("n-3")), RouteOutcome::Duplicate);
        assert!(surface.displayed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_without_permission_is_suppressed() {
        let (router, surface, env) = router(Permission::Default);
        env.set_visibility(Visibility::Hidden);

        assert_eq!(router.deliver_realtime(&record("n-4")), RouteOutcome::Suppressed);
        assert!(!router.ledger().was_rendered("n-4"));

        // Granting later still renders the same id exactly once.
        surface.set_permission(Permission::Granted);
        assert_eq!(router.deliver_realtime(&record("n-4")), RouteOutcome::Rendered);
        assert_eq!(router.deliver_realtime(&record("n-4")), RouteOutcome::Duplicate);
        assert_eq!(surface.displayed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_without_permission_renders_after_grant() {
        let (router, surface, env) = router(Permission::Default);
        env.set_visibility(Visibility::Hidden);

        assert_eq!(router.deliver_push(&record("n-6")), RouteOutcome::Suppressed);

        surface.set_permission(Permission::Granted);
        assert_eq!(router.deliver_push(&record("n-6")), RouteOutcome::Rendered);
        assert_eq!(router.deliver_push(&record("n-6")), RouteOutcome::Duplicate);
        assert_eq!(surface.displayed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seen_in_app_is_not_rendered_after_hiding() {
        let (router, surface, env) = router(Permission::Granted);

        assert_eq!(router.deliver_realtime(&record("n-7")), RouteOutcome::Visible);
        env.set_visibility(Visibility::Hidden);

        assert_eq!(router.deliver_realtime(&record("n-7")), RouteOutcome::Duplicate);
        assert_eq!(router.deliver_push(&record("n-7")), RouteOutcome::Duplicate);
        assert!(surface.displayed().is_empty());
        assert!(router.ledger().was_seen_in_app("n-7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_display_does_not_consume_the_render() {
        let (router, surface, env) = router(Permission::Granted);
        env.set_visibility(Visibility::Hidden);
        surface.fail_display(true);

        assert_eq!(router.deliver_push(&record("n-8")), RouteOutcome::Suppressed);
        assert!(!router.ledger().was_rendered("n-8"));

        surface.fail_display(false);
        assert_eq!(router.deliver_realtime(&record("n-8")), RouteOutcome::Rendered);
        assert_eq!(surface.displayed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_routes_dispatched_notifications() {
        let (router, surface, env) = router(Permission::Granted);
        let dispatcher = EventDispatcher::new();
        router.attach(&dispatcher);
        env.set_visibility(Visibility::Hidden);

        dispatcher.dispatch(&ClientEvent::Notification(record("n-5")));
        dispatcher.dispatch(&ClientEvent::Notification(record("n-5")));

        assert_eq!(surface.displayed().len(), 1);
        assert_eq!(router.ledger().first_path("n-5"), Some(DeliveryPath::Realtime));
    }
}
