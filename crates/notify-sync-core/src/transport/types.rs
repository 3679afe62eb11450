use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::models::{Notification, UpdateStatus};

/// Frame pushed by the server over the live channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundEvent {
    New {
        notification: Notification,
    },
    Update {
        id: String,
        status: UpdateStatus,
    },
    #[serde(rename_all = "camelCase")]
    Count {
        /// Signed on the wire; clamped on apply
        unread_count: i64,
    },
}

impl InboundEvent {
    pub fn parse(frame: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(frame)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::New { .. } => "new",
            InboundEvent::Update { .. } => "update",
            InboundEvent::Count { .. } => "count",
        }
    }
}

/// Broadcast to the user's other sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundEvent {
    MarkRead { id: String },
    MarkAllRead,
}

impl OutboundEvent {
    pub fn to_frame(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }
}
