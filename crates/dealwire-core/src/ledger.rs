//! Bounded record of notification ids that already reached the user.
//!
//! The realtime and push paths can both carry the same notification. Both
//! consult one shared [`DeliveryLedger`] so a given id is rendered as a
//! platform notification at most once.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::defaults::LEDGER_CAPACITY;

/// How a notification id was first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryPath {
    /// Arrived over the realtime channel.
    Realtime,
    /// Arrived through the platform push service.
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    path: DeliveryPath,
    rendered: bool,
    /// Shown by the application itself while the document was visible.
    seen_in_app: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

/// FIFO-bounded id set; the oldest ids are forgotten once `capacity` is hit.
#[derive(Debug)]
pub struct DeliveryLedger {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl DeliveryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `id` arrived via `path`.
    ///
    /// Returns `true` the first time an id is seen, `false` for duplicates.
    pub fn record(&self, id: &str, path: DeliveryPath) -> bool {
        let mut inner = self.lock();
        if inner.entries.contains_key(id) {
            return false;
        }
        while inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.entries.insert(
            id.to_string(),
            Entry {
                path,
                rendered: false,
                seen_in_app: false,
            },
        );
        inner.order.push_back(id.to_string());
        true
    }

    /// Claim the single platform render for `id`.
    ///
    /// Returns `true` exactly once per remembered id; unknown ids are
    /// recorded first so the claim still sticks.
    pub fn claim_render(&self, id: &str, path: DeliveryPath) -> bool {
        self.record(id, path);
        let mut inner = self.lock();
        match inner.entries.get_mut(id) {
            Some(entry) if !entry.rendered => {
                entry.rendered = true;
                true
            }
            _ => false,
        }
    }

    /// Give back a claim whose render did not happen.
    pub fn release_render(&self, id: &str) {
        if let Some(entry) = self.lock().entries.get_mut(id) {
            entry.rendered = false;
        }
    }

    /// Record that the application displayed `id` in-app.
    pub fn mark_seen_in_app(&self, id: &str, path: DeliveryPath) {
        self.record(id, path);
        if let Some(entry) = self.lock().entries.get_mut(id) {
            entry.seen_in_app = true;
        }
    }

    pub fn was_seen_in_app(&self, id: &str) -> bool {
        self.lock().entries.get(id).is_some_and(|e| e.seen_in_app)
    }

    /// Whether `id` already reached the user, rendered or in-app.
    pub fn is_delivered(&self, id: &str) -> bool {
        self.lock()
            .entries
            .get(id)
            .is_some_and(|e| e.rendered || e.seen_in_app)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// Path on which `id` was first seen.
    pub fn first_path(&self, id: &str) -> Option<DeliveryPath> {
        self.lock().entries.get(id).map(|e| e.path)
    }

    pub fn was_rendered(&self, id: &str) -> bool {
        self.lock().entries.get(id).is_some_and(|e| e.rendered)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeliveryLedger {
    fn default() -> Self {
        Self::new(LEDGER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_detects_duplicates() {
        let ledger = DeliveryLedger::default();
        assert!(ledger.record("n1", DeliveryPath::Realtime));
        assert!(!ledger.record("n1", DeliveryPath::Push));
        assert_eq!(ledger.first_path("n1"), Some(DeliveryPath::Realtime));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_claim_render_once() {
        let ledger = DeliveryLedger::default();
        assert!(ledger.claim_render("n1", DeliveryPath::Push));
        assert!(!ledger.claim_render("n1", DeliveryPath::Realtime));
        assert!(ledger.was_rendered("n1"));
    }

    #[test]
    fn test_recorded_but_unrendered_can_still_claim() {
        let ledger = DeliveryLedger::default();
        ledger.record("n2", DeliveryPath::Realtime);
        assert!(!ledger.was_rendered("n2"));
        assert!(ledger.claim_render("n2", DeliveryPath::Realtime));
    }

    #[test]
    fn test_released_claim_can_be_taken_again() {
        let ledger = DeliveryLedger::default();
        assert!(ledger.claim_render("n3", DeliveryPath::Push));
        ledger.release_render("n3");
        assert!(!ledger.is_delivered("n3"));
        assert!(ledger.claim_render("n3", DeliveryPath::Realtime));
    }

    #[test]
    fn test_seen_in_app_counts_as_delivered() {
        let ledger = DeliveryLedger::default();
        ledger.record("n4", DeliveryPath::Realtime);
        assert!(!ledger.is_delivered("n4"));

        ledger.mark_seen_in_app("n4", DeliveryPath::Realtime);
        assert!(ledger.was_seen_in_app("n4"));
        assert!(!ledger.was_rendered("n4"));
        assert!(ledger.is_delivered("n4"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let ledger = DeliveryLedger::new(2);
        ledger.record("a", DeliveryPath::Realtime);
        ledger.record("b", DeliveryPath::Realtime);
        ledger.record("c", DeliveryPath::Realtime);

        assert!(!ledger.contains("a"));
        assert!(ledger.contains("b"));
        assert!(ledger.contains("c"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let ledger = DeliveryLedger::new(0);
        assert!(ledger.record("a", DeliveryPath::Push));
        assert!(ledger.contains("a"));
        assert!(!ledger.is_empty());
    }
}
