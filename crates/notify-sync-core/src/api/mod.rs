//! REST collaborator contract.

pub mod http;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::{NotificationPage, UnreadLink};

pub use http::HttpNotificationApi;

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn fetch_notifications(
        &self,
        token: &str,
        limit: usize,
    ) -> Result<NotificationPage, SyncError>;

    async fn fetch_unread_links(&self, token: &str) -> Result<Vec<UnreadLink>, SyncError>;

    async fn mark_one_read(&self, token: &str, id: &str) -> Result<(), SyncError>;

    async fn mark_all_read(&self, token: &str) -> Result<(), SyncError>;
}
