use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::Sanitizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Navigation target; may be absolute or relative
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Strip markup from the display fields before the item reaches the store
    pub fn sanitized(mut self, sanitizer: &dyn Sanitizer) -> Self {
        self.title = sanitizer.sanitize(&self.title);
        self.description = sanitizer.sanitize(&self.description);
        self
    }
}

/// Remote status change carried by an `update` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Read,
    Deleted,
}

/// Response of the notification list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    /// Servers have been seen sending negative counts; clamp on ingest
    pub unread_count: i64,
}

impl NotificationPage {
    pub fn clamped_unread_count(&self) -> u64 {
        self.unread_count.max(0) as u64
    }
}

/// One row of the unread-link index endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadLink {
    pub uid: String,
    pub link: String,
}

impl UnreadLink {
    pub fn new(uid: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            link: link.into(),
        }
    }
}
