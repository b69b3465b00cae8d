//! Host platform seams: the push service and the notification surface.
//!
//! A browser shell, a desktop wrapper or a test fake implements these; the
//! manager and renderer never touch platform APIs directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dealwire_core::{Priority, PushSubscription, Result};

use crate::capabilities::Capabilities;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Not decided yet.
    #[default]
    Default,
    Granted,
    Denied,
    /// The prompt was closed without a decision. Reported by a prompt, never
    /// as the stored platform state, which stays at `Default`.
    Dismissed,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        matches!(self, Permission::Granted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform push service (service worker + push manager in a browser).
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// What the platform offers. Called once, at manager construction.
    fn capabilities(&self) -> Capabilities;

    fn permission(&self) -> Permission;

    /// Show the permission prompt and return the user's answer.
    async fn request_permission(&self) -> Result<Permission>;

    /// The subscription this installation already holds, if any.
    async fn get_subscription(&self) -> Result<Option<PushSubscription>>;

    /// Create a subscription bound to the VAPID application server key.
    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscription>;

    /// Cancel the current subscription. `Ok(false)` if there was none.
    async fn unsubscribe(&self) -> Result<bool>;
}

/// A notification handed to the platform surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    /// De-duplication tag; showing the same tag again replaces the old one.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// Keep on screen until the user interacts with it.
    pub require_interaction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
}

/// Where local notifications are drawn and where clicks lead.
pub trait NotificationSurface: Send + Sync {
    fn permission(&self) -> Permission;

    fn display(&self, notification: &LocalNotification) -> Result<()>;

    /// Close the notification with `tag`, if it is still shown.
    fn close(&self, tag: &str);

    /// Bring the application window to the foreground.
    fn focus_app(&self);

    /// Route the application to `path`.
    fn navigate(&self, path: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_default_is_undecided() {
        assert_eq!(Permission::default(), Permission::Default);
        assert!(!Permission::Default.is_granted());
        assert!(Permission::Granted.is_granted());
        assert_eq!(Permission::Denied.to_string(), "denied");
        assert!(!Permission::Dismissed.is_granted());
        assert_eq!(Permission::Dismissed.to_string(), "dismissed");
    }

    #[test]
    fn test_permission_serde() {
        let json = serde_json::to_string(&Permission::Granted).unwrap();
        assert_eq!(json, r#""granted""#);
        let parsed: Permission = serde_json::from_str(r#""default""#).unwrap();
        assert_eq!(parsed, Permission::Default);
    }

    #[test]
    fn test_local_notification_serializes_camel_case() {
        let notification = LocalNotification {
            tag: "n-1".to_string(),
            title: "Stage moved".to_string(),
            body: "Acme moved to negotiation".to_string(),
            priority: Priority::High,
            require_interaction: true,
            icon: None,
            deal_id: Some("deal-42".to_string()),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["requireInteraction"], true);
        assert_eq!(json["dealId"], "deal-42");
        assert!(json.get("icon").is_none());
    }
}
