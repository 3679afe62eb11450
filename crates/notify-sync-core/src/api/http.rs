use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use super::NotificationApi;
use crate::error::SyncError;
use crate::models::{NotificationPage, UnreadLink};

/// reqwest-backed notification API client
pub struct HttpNotificationApi {
    base_url: Url,
    client: Client,
}

impl HttpNotificationApi {
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self, SyncError> {
        // Without the trailing slash `join` would replace the last segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| SyncError::Network(format!("Invalid API base URL {}: {}", base_url, e)))?;
        Ok(Self { base_url, client })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::Network(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn check(response: Response) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

fn status_error(status: StatusCode, body: &str) -> SyncError {
    let message = format!("Notification API error ({}): {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Auth(message),
        _ => SyncError::Network(message),
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_notifications(
        &self,
        token: &str,
        limit: usize,
    ) -> Result<NotificationPage, SyncError> {
        let mut url = self.endpoint("notifications")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let page = Self::check(response).await?.json().await?;
        Ok(page)
    }

    async fn fetch_unread_links(&self, token: &str) -> Result<Vec<UnreadLink>, SyncError> {
        let url = self.endpoint("notifications/unread-links")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let links = Self::check(response).await?.json().await?;
        Ok(links)
    }

    async fn mark_one_read(&self, token: &str, id: &str) -> Result<(), SyncError> {
        let mut url = self.endpoint("notifications/")?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Network("API base URL cannot have path segments".to_string()))?
            .pop_if_empty()
            .push(id)
            .push("read");

        let response = self.client.post(url).bearer_auth(token).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn mark_all_read(&self, token: &str) -> Result<(), SyncError> {
        let url = self.endpoint("notifications/read-all")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
