//! Platform capability flags.
//!
//! Missing push support is a normal condition (older browsers, embedded
//! webviews), not an error. The flags are probed once when the manager is
//! built and cached for its lifetime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// A push service is available (service worker + push manager).
    pub push: bool,
    /// The platform can display notifications.
    pub notifications: bool,
}

impl Capabilities {
    /// Everything available.
    pub fn full() -> Self {
        Self {
            push: true,
            notifications: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Push delivery needs both a push service and a way to show the result.
    pub fn supports_push(&self) -> bool {
        self.push && self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_requires_notifications() {
        assert!(Capabilities::full().supports_push());
        assert!(!Capabilities::none().supports_push());
        let push_only = Capabilities {
            push: true,
            notifications: false,
        };
        assert!(!push_only.supports_push());
    }
}
