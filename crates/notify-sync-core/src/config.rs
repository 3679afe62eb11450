use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{self, env};

/// A route whose identity depends on some of its query parameters,
/// e.g. `/forum/topic?id=5` where `id` picks the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIdentityRoute {
    /// Path the rule applies to (compared after normalization)
    pub path: String,
    /// Query keys kept in the normalized link
    pub keys: Vec<String>,
}

impl QueryIdentityRoute {
    pub fn new(path: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            path: path.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Session configuration, loadable from a JSON file with env overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub socket_path: PathBuf,
    pub notification_limit: usize,
    pub debounce_ms: u64,
    pub reconnect_delay_ms: u64,
    pub query_identity_routes: Vec<QueryIdentityRoute>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            socket_path: constants::default_socket_path(),
            notification_limit: constants::DEFAULT_NOTIFICATION_LIMIT,
            debounce_ms: constants::DEFAULT_DEBOUNCE_MS,
            reconnect_delay_ms: constants::DEFAULT_RECONNECT_DELAY_MS,
            query_identity_routes: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Load config from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Override fields from `NOTIFY_SYNC_*` environment variables.
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(env::API_URL) {
            self.api_base_url = url;
        }
        if let Ok(path) = std::env::var(env::SOCKET) {
            self.socket_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(env::LIMIT) {
            match raw.parse() {
                Ok(limit) => self.notification_limit = limit,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {}", env::LIMIT),
            }
        }
        if let Ok(raw) = std::env::var(env::DEBOUNCE_MS) {
            match raw.parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {}", env::DEBOUNCE_MS),
            }
        }
        self
    }

    pub fn with_query_route(mut self, route: QueryIdentityRoute) -> Self {
        self.query_identity_routes.push(route);
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
