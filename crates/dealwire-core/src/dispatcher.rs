//! Local pub/sub registry that fans client events out to listeners.
//!
//! Multiple independent features observe the same inbound stream without
//! coordinating: each registers listeners per [`EventKind`] and receives every
//! matching [`ClientEvent`] synchronously, in registration order.
//!
//! A listener that panics is isolated. The panic is caught and logged, the
//! remaining listeners still run, and the dispatcher stays usable.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::{ClientEvent, EventKind};
use crate::logging::SUBSYSTEM_DISPATCH;

/// Callback invoked for each dispatched event of the registered kind.
pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handle returned by [`EventDispatcher::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Result of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Listeners that were called.
    pub invoked: usize,
    /// Listeners among those that panicked.
    pub panicked: usize,
}

#[derive(Default)]
pub struct EventDispatcher {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(ListenerId, Listener)>>> {
        // Listeners never run under this lock, so poisoning only means a
        // panic elsewhere while holding it; the map itself is still valid.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.table().entry(kind).or_default().push((id, listener));
        tracing::trace!(subsystem = SUBSYSTEM_DISPATCH, %kind, ?id, "Listener registered");
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut table = self.table();
        let Some(entries) = table.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            table.remove(&kind);
        }
        removed
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.table().get(&kind).map_or(0, Vec::len)
    }

    /// Drop every registered listener.
    pub fn clear(&self) {
        self.table().clear();
    }

    /// Invoke every listener registered for the event's kind.
    ///
    /// The listener list is snapshotted first, so callbacks may register or
    /// unregister listeners; changes take effect from the next dispatch.
    pub fn dispatch(&self, event: &ClientEvent) -> DispatchOutcome {
        let kind = event.kind();
        let snapshot: Vec<(ListenerId, Listener)> = match self.table().get(&kind) {
            Some(entries) => entries.clone(),
            None => return DispatchOutcome::default(),
        };

        let mut outcome = DispatchOutcome::default();
        for (id, listener) in snapshot {
            outcome.invoked += 1;
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                outcome.panicked += 1;
                tracing::warn!(
                    subsystem = SUBSYSTEM_DISPATCH,
                    event_kind = %kind,
                    ?id,
                    "Listener panicked, continuing with remaining listeners"
                );
            }
        }
        tracing::trace!(
            subsystem = SUBSYSTEM_DISPATCH,
            event_kind = %kind,
            listener_count = outcome.invoked,
            "Event dispatched"
        );
        outcome
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventKind, usize> =
            self.table().iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionState;
    use std::sync::atomic::AtomicUsize;

    fn pipeline_event() -> ClientEvent {
        ClientEvent::PipelineChanged {
            topic_id: "deal-42".to_string(),
            from_stage: "qualification".to_string(),
            to_stage: "negotiation".to_string(),
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            dispatcher.on(EventKind::PipelineChanged, move |_| {
                order.lock().unwrap().push(n);
            });
        }

        let outcome = dispatcher.dispatch(&pipeline_event());
        assert_eq!(outcome.invoked, 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dispatch_only_matching_kind() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        dispatcher.on(EventKind::DealUpdated, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = dispatcher.dispatch(&pipeline_event());
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let second = Arc::new(AtomicUsize::new(0));

        dispatcher.on(EventKind::PipelineChanged, |_| panic!("listener bug"));
        let s = second.clone();
        dispatcher.on(EventKind::PipelineChanged, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = dispatcher.dispatch(&pipeline_event());
        assert_eq!(outcome.invoked, 2);
        assert_eq!(outcome.panicked, 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // Dispatcher still works afterwards
        dispatcher.dispatch(&pipeline_event());
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_removes_only_that_listener() {
        let dispatcher = EventDispatcher::new();
        let a = dispatcher.on(EventKind::ConnectionStatus, |_| {});
        let _b = dispatcher.on(EventKind::ConnectionStatus, |_| {});
        assert_eq!(dispatcher.listener_count(EventKind::ConnectionStatus), 2);

        assert!(dispatcher.off(EventKind::ConnectionStatus, a));
        assert_eq!(dispatcher.listener_count(EventKind::ConnectionStatus), 1);

        // Second removal and wrong kind are no-ops
        assert!(!dispatcher.off(EventKind::ConnectionStatus, a));
        assert!(!dispatcher.off(EventKind::Notification, a));
    }

    #[test]
    fn test_listener_may_unregister_itself_during_dispatch() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let d = dispatcher.clone();
        let c = calls.clone();
        let s = slot.clone();
        let id = dispatcher.on(EventKind::ConnectionStatus, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *s.lock().unwrap() {
                d.off(EventKind::ConnectionStatus, id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        let event = ClientEvent::status(ConnectionState::Connected);
        dispatcher.dispatch(&event);
        dispatcher.dispatch(&event);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on(EventKind::Notification, |_| {});
        dispatcher.on(EventKind::UserTyping, |_| {});
        dispatcher.clear();
        assert_eq!(dispatcher.listener_count(EventKind::Notification), 0);
        assert_eq!(dispatcher.listener_count(EventKind::UserTyping), 0);
    }
}
