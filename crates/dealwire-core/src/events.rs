//! Wire messages and typed client events for the realtime channel.
//!
//! Frames on the wire are JSON objects tagged by a snake_case `type` field,
//! e.g. `{"type":"join_topic","topic_id":"deal-42"}`. Inbound frames decode
//! into [`ServerMessage`]; after topic filtering they become [`ClientEvent`]s,
//! the closed set of things application listeners can observe.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::NotificationRecord;
use crate::state::ConnectionState;

// ============================================================================
// Outgoing
// ============================================================================

/// Frames the client sends to the notification server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinTopic { topic_id: String },
    LeaveTopic { topic_id: String },
    MarkNotificationRead { notification_id: String },
    UserTyping { topic_id: String, is_typing: bool },
}

impl ClientMessage {
    pub fn join(topic_id: impl Into<String>) -> Self {
        Self::JoinTopic {
            topic_id: topic_id.into(),
        }
    }

    pub fn leave(topic_id: impl Into<String>) -> Self {
        Self::LeaveTopic {
            topic_id: topic_id.into(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// Frames the notification server sends to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Notification {
        notification: NotificationRecord,
    },
    DealUpdated {
        topic_id: String,
        patch: Value,
    },
    PipelineChanged {
        topic_id: String,
        from_stage: String,
        to_stage: String,
    },
    UserActivity {
        user_id: String,
        activity: Value,
    },
    AiAnalysisComplete {
        topic_id: String,
        result: Value,
    },
    UserTyping {
        user_id: String,
        topic_id: String,
        is_typing: bool,
    },
}

impl ServerMessage {
    /// Decode a JSON text frame.
    pub fn from_frame(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Topic the message is scoped to, if any.
    ///
    /// Notifications and user activity are addressed to the session, not to a
    /// topic, and are always delivered.
    pub fn topic(&self) -> Option<&str> {
        match self {
            ServerMessage::DealUpdated { topic_id, .. }
            | ServerMessage::PipelineChanged { topic_id, .. }
            | ServerMessage::AiAnalysisComplete { topic_id, .. }
            | ServerMessage::UserTyping { topic_id, .. } => Some(topic_id),
            ServerMessage::Notification { .. } | ServerMessage::UserActivity { .. } => None,
        }
    }
}

impl From<ServerMessage> for ClientEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Notification { notification } => ClientEvent::Notification(notification),
            ServerMessage::DealUpdated { topic_id, patch } => {
                ClientEvent::DealUpdated { topic_id, patch }
            }
            ServerMessage::PipelineChanged {
                topic_id,
                from_stage,
                to_stage,
            } => ClientEvent::PipelineChanged {
                topic_id,
                from_stage,
                to_stage,
            },
            ServerMessage::UserActivity { user_id, activity } => {
                ClientEvent::UserActivity { user_id, activity }
            }
            ServerMessage::AiAnalysisComplete { topic_id, result } => {
                ClientEvent::AiAnalysisComplete { topic_id, result }
            }
            ServerMessage::UserTyping {
                user_id,
                topic_id,
                is_typing,
            } => ClientEvent::UserTyping {
                user_id,
                topic_id,
                is_typing,
            },
        }
    }
}

// ============================================================================
// Local events
// ============================================================================

/// The fixed set of event kinds listeners can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Notification,
    DealUpdated,
    PipelineChanged,
    UserActivity,
    AiAnalysisComplete,
    ConnectionStatus,
    UserTyping,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Notification,
        EventKind::DealUpdated,
        EventKind::PipelineChanged,
        EventKind::UserActivity,
        EventKind::AiAnalysisComplete,
        EventKind::ConnectionStatus,
        EventKind::UserTyping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Notification => "notification",
            EventKind::DealUpdated => "deal_updated",
            EventKind::PipelineChanged => "pipeline_changed",
            EventKind::UserActivity => "user_activity",
            EventKind::AiAnalysisComplete => "ai_analysis_complete",
            EventKind::ConnectionStatus => "connection_status",
            EventKind::UserTyping => "user_typing",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed event delivered to application listeners.
///
/// Serialized with an `event` tag for logging and the CLI, e.g.
/// `{"event":"connection_status","state":"connected"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Notification(NotificationRecord),
    DealUpdated {
        topic_id: String,
        patch: Value,
    },
    PipelineChanged {
        topic_id: String,
        from_stage: String,
        to_stage: String,
    },
    UserActivity {
        user_id: String,
        activity: Value,
    },
    AiAnalysisComplete {
        topic_id: String,
        result: Value,
    },
    ConnectionStatus {
        state: ConnectionState,
    },
    UserTyping {
        user_id: String,
        topic_id: String,
        is_typing: bool,
    },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Notification(_) => EventKind::Notification,
            ClientEvent::DealUpdated { .. } => EventKind::DealUpdated,
            ClientEvent::PipelineChanged { .. } => EventKind::PipelineChanged,
            ClientEvent::UserActivity { .. } => EventKind::UserActivity,
            ClientEvent::AiAnalysisComplete { .. } => EventKind::AiAnalysisComplete,
            ClientEvent::ConnectionStatus { .. } => EventKind::ConnectionStatus,
            ClientEvent::UserTyping { .. } => EventKind::UserTyping,
        }
    }

    pub fn status(state: ConnectionState) -> Self {
        ClientEvent::ConnectionStatus { state }
    }
}

// ============================================================================
// Tests
// ============================================================================
