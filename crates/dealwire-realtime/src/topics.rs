//! Desired topic membership, independent of connection health.

use std::collections::BTreeSet;

/// The set of topics the client wants events for.
///
/// This is the single source of truth: wire-level joins are derived from it
/// on every (re)connect, never the other way round. Ordered so replay is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRegistry {
    topics: BTreeSet<String>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic. Returns `true` if it was not already a member.
    pub fn join(&mut self, topic: &str) -> bool {
        if self.topics.contains(topic) {
            return false;
        }
        self.topics.insert(topic.to_string())
    }

    /// Remove a topic. Returns `true` if it was a member.
    pub fn leave(&mut self, topic: &str) -> bool {
        self.topics.remove(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
