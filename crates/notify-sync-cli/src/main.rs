mod tracing_setup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify_sync_core::api::HttpNotificationApi;
use notify_sync_core::bus::{NoticeKind, SyncNotice};
use notify_sync_core::constants::env;
use notify_sync_core::sync::{StaticToken, VisitOutcome};
use notify_sync_core::transport::SocketTransport;
use notify_sync_core::{NotificationCenter, SyncConfig, SyncContext};
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser)]
#[command(name = "notify-sync")]
#[command(about = "Run a notification sync session against a live server")]
struct Cli {
    /// Path to JSON config file (apiBaseUrl, socketPath, debounceMs, ...)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Bearer token; falls back to NOTIFY_SYNC_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every change notice until Ctrl-C
    Watch,

    /// Fetch once and print the notification list
    List,

    /// Mark one notification as read
    MarkRead {
        /// Notification id
        id: String,
    },

    /// Mark every notification as read
    MarkAllRead,

    /// Pretend to visit a page and auto-mark what points at it
    Visit {
        /// Path, e.g. /forum/topics/5
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init_tracing()?;

    let config = load_config(&cli)?;
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var(env::TOKEN).ok());

    let api = HttpNotificationApi::new(&config.api_base_url)
        .with_context(|| format!("Invalid API base URL {}", config.api_base_url))?;
    let transport = SocketTransport::from_config(&config);
    info!(api = %config.api_base_url, socket = %transport.socket_path().display(), "Starting session");

    let ctx = SyncContext::new(
        Arc::new(api),
        Arc::new(transport),
        Arc::new(StaticToken(token)),
        config,
    );
    let center = NotificationCenter::new(ctx);
    center
        .start()
        .await
        .context("Failed to start notification session")?;

    let result = run_command(&center, cli.command, cli.pretty).await;
    center.shutdown();
    result
}

async fn run_command(center: &NotificationCenter, command: Commands, pretty: bool) -> Result<()> {
    match command {
        Commands::Watch => {
            print_json(&snapshot(center), pretty)?;
            let _subscriptions: Vec<_> = [
                NoticeKind::NotificationAdded,
                NoticeKind::NotificationUpdated,
                NoticeKind::CountChanged,
                NoticeKind::Reconciled,
                NoticeKind::ConnectionChanged,
                NoticeKind::Error,
            ]
            .into_iter()
            .map(|kind| {
                center.subscribe(kind, move |notice| {
                    if let Err(e) = print_json(&notice_json(notice), pretty) {
                        eprintln!("Error: {}", e);
                    }
                })
            })
            .collect();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, shutting down");
        }
        Commands::List => print_json(&snapshot(center), pretty)?,
        Commands::MarkRead { id } => {
            center.mark_as_read(&id).await?;
            print_json(&snapshot(center), pretty)?;
        }
        Commands::MarkAllRead => {
            center.mark_all_as_read().await?;
            print_json(&snapshot(center), pretty)?;
        }
        Commands::Visit { path } => {
            let outcome = center.visit(&path).await;
            print_json(&outcome_json(&path, &outcome), pretty)?;
        }
    }
    Ok(())
}

/// Config file if given, then environment overrides
fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let config = match cli.config {
        Some(ref path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    Ok(config.apply_env())
}

fn snapshot(center: &NotificationCenter) -> Value {
    json!({
        "unreadCount": center.unread_count(),
        "connected": center.is_connected(),
        "error": center.error().map(|e| e.to_string()),
        "notifications": center.notifications(),
    })
}

fn notice_json(notice: &SyncNotice) -> Value {
    match notice {
        SyncNotice::NotificationAdded(notification) => {
            json!({ "type": "notificationAdded", "notification": notification })
        }
        SyncNotice::NotificationUpdated { id, status } => {
            json!({ "type": "notificationUpdated", "id": id, "status": status })
        }
        SyncNotice::CountChanged(count) => json!({ "type": "countChanged", "unreadCount": count }),
        SyncNotice::Reconciled {
            total,
            unread_count,
        } => json!({ "type": "reconciled", "total": total, "unreadCount": unread_count }),
        SyncNotice::ConnectionChanged(state) => {
            json!({ "type": "connectionChanged", "state": state })
        }
        SyncNotice::Error(e) => json!({ "type": "error", "message": e.to_string() }),
    }
}

fn outcome_json(path: &str, outcome: &VisitOutcome) -> Value {
    match outcome {
        VisitOutcome::Idle => json!({ "path": path, "outcome": "idle" }),
        VisitOutcome::AlreadyMarking => json!({ "path": path, "outcome": "alreadyMarking" }),
        VisitOutcome::Abandoned => json!({ "path": path, "outcome": "abandoned" }),
        VisitOutcome::Marked { succeeded, failed } => json!({
            "path": path,
            "outcome": "marked",
            "succeeded": succeeded,
            "failed": failed,
        }),
    }
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_sync_core::transport::ConnectionState;
    use notify_sync_core::UpdateStatus;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["notify-sync", "--token", "t", "mark-read", "n1"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("t"));
        assert!(matches!(cli.command, Commands::MarkRead { ref id } if id == "n1"));

        let cli = Cli::try_parse_from(["notify-sync", "-p", "visit", "/forum/topics/5"]).unwrap();
        assert!(cli.pretty);
        assert!(matches!(cli.command, Commands::Visit { ref path } if path == "/forum/topics/5"));

        assert!(Cli::try_parse_from(["notify-sync"]).is_err());
    }

    #[test]
    fn test_notice_json_shapes() {
        let value = notice_json(&SyncNotice::NotificationUpdated {
            id: "n1".to_string(),
            status: UpdateStatus::Deleted,
        });
        assert_eq!(value["status"], "deleted");

        let value = notice_json(&SyncNotice::ConnectionChanged(ConnectionState::Open));
        assert_eq!(value["state"], "open");

        let value = outcome_json(
            "/a",
            &VisitOutcome::Marked {
                succeeded: vec!["n1".to_string()],
                failed: Vec::new(),
            },
        );
        assert_eq!(value["outcome"], "marked");
        assert_eq!(value["succeeded"][0], "n1");
    }
}
