use std::fs::OpenOptions;

use anyhow::{Context, Result};
use notify_sync_core::constants::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env(env::LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry();

    if let Ok(log_path) = std::env::var(env::LOG_FILE) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(filter);

        registry.with(file_layer).init();
        eprintln!("File logging enabled: {}", log_path);
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter);
        registry.with(stderr_layer).init();
    }
    Ok(())
}
