//! Host environment signals: document visibility and network reachability.
//!
//! The host (browser shell, desktop wrapper, or a test) feeds transitions in
//! through [`EnvironmentSignals`]; the realtime client watches them to repair
//! its connection and the notification router reads visibility to decide
//! whether a local notification may be rendered.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkStatus {
    #[default]
    Online,
    Offline,
}

struct Signals {
    visibility: watch::Sender<Visibility>,
    network: watch::Sender<NetworkStatus>,
}

/// Shared, cloneable handle to the current visibility and network status.
///
/// Watchers are only woken on actual transitions; setting the current value
/// again is a no-op.
#[derive(Clone)]
pub struct EnvironmentSignals {
    inner: Arc<Signals>,
}

impl EnvironmentSignals {
    pub fn new(visibility: Visibility, network: NetworkStatus) -> Self {
        let (visibility, _) = watch::channel(visibility);
        let (network, _) = watch::channel(network);
        Self {
            inner: Arc::new(Signals {
                visibility,
                network,
            }),
        }
    }

    pub fn visibility(&self) -> Visibility {
        *self.inner.visibility.borrow()
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility() == Visibility::Hidden
    }

    pub fn network(&self) -> NetworkStatus {
        *self.inner.network.borrow()
    }

    /// Record a visibility change. Returns `true` if the value changed.
    pub fn set_visibility(&self, visibility: Visibility) -> bool {
        let changed = self.inner.visibility.send_if_modified(|current| {
            if *current == visibility {
                return false;
            }
            *current = visibility;
            true
        });
        if changed {
            tracing::debug!(?visibility, "Visibility changed");
        }
        changed
    }

    /// Record a network status change. Returns `true` if the value changed.
    pub fn set_network(&self, network: NetworkStatus) -> bool {
        let changed = self.inner.network.send_if_modified(|current| {
            if *current == network {
                return false;
            }
            *current = network;
            true
        });
        if changed {
            tracing::debug!(?network, "Network status changed");
        }
        changed
    }

    pub fn watch_visibility(&self) -> watch::Receiver<Visibility> {
        self.inner.visibility.subscribe()
    }

    pub fn watch_network(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.network.subscribe()
    }
}

impl Default for EnvironmentSignals {
    fn default() -> Self {
        Self::new(Visibility::Visible, NetworkStatus::Online)
    }
}

impl std::fmt::Debug for EnvironmentSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentSignals")
            .field("visibility", &self.visibility())
            .field("network", &self.network())
            .finish()
    }
}
