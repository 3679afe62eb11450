//! Default values shared by configuration, adapters and the CLI.

use std::time::Duration;

/// Default REST base URL when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/";

/// Default page size for the notification list fetch
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 20;

/// Navigation debounce before auto-marking, in milliseconds.
/// Long enough to ignore redirect flicker, short enough to feel immediate.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Delay between socket reconnect attempts, in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

pub fn default_socket_path() -> std::path::PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        std::path::PathBuf::from(runtime_dir).join("notify-sync.sock")
    } else {
        std::path::PathBuf::from("/tmp/notify-sync.sock")
    }
}

pub fn default_debounce() -> Duration {
    Duration::from_millis(DEFAULT_DEBOUNCE_MS)
}

// Environment variable names
pub mod env {
    pub const API_URL: &str = "NOTIFY_SYNC_API_URL";
    pub const SOCKET: &str = "NOTIFY_SYNC_SOCKET";
    pub const LIMIT: &str = "NOTIFY_SYNC_LIMIT";
    pub const DEBOUNCE_MS: &str = "NOTIFY_SYNC_DEBOUNCE_MS";
    pub const TOKEN: &str = "NOTIFY_SYNC_TOKEN";
    pub const LOG: &str = "NOTIFY_SYNC_LOG";
    pub const LOG_FILE: &str = "NOTIFY_SYNC_LOG_FILE";
}
