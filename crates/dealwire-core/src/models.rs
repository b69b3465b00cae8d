//! Notification and push-subscription records exchanged with the server.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a server-generated notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DealUpdate,
    PipelineChange,
    AiAnalysis,
    Comment,
    Mention,
    System,
}

/// Display priority. `High` notifications are never auto-dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A notification created by the server and consumed once by the client.
///
/// `id` is the de-duplication key across the realtime and push paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub organization_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub priority: Priority,
}

impl NotificationRecord {
    /// Deal the notification points at, from `dealId` or `payload.dealId`.
    pub fn referenced_deal(&self) -> Option<&str> {
        self.deal_id.as_deref().or_else(|| {
            self.payload
                .as_ref()
                .and_then(|p| p.get("dealId"))
                .and_then(|v| v.as_str())
        })
    }
}

/// Key material issued by the platform push service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Platform-issued push endpoint plus keys, before it is bound to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// The record persisted server-side, one per device/browser installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionRecord {
    pub endpoint: String,
    pub keys: PushKeys,
    pub user_id: String,
    pub organization_id: String,
}

impl PushSubscriptionRecord {
    pub fn new(
        subscription: PushSubscription,
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: subscription.endpoint,
            keys: subscription.keys,
            user_id: user_id.into(),
            organization_id: organization_id.into(),
        }
    }
}
