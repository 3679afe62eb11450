//! Session wiring: the collaborators a session is built from, and the
//! components that keep its state in step with the server.

pub mod events;
pub mod navigation;
pub mod reconcile;
pub mod session;

use std::sync::Arc;

use crate::api::NotificationApi;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::sanitize::{Sanitizer, StripTags};
use crate::transport::Transport;

pub use navigation::{NavigationWatcher, VisitOutcome};
pub use reconcile::{ReconcileTrigger, Reconciler};
pub use session::Session;

/// Source of the bearer token. A token being present is what "enabled" means.
pub trait AuthProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Called when a request was refused or no token was available
    fn on_auth_error(&self, error: &SyncError) {
        tracing::warn!(error = %error, "Notification sync needs re-authentication");
    }
}

/// Fixed token, e.g. from a CLI flag
#[derive(Debug, Clone)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }
}

impl AuthProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Where user-facing errors go (toast, status line, log)
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &SyncError);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &SyncError) {
        tracing::warn!(error = %error, "Notification sync error");
    }
}

/// Everything a session depends on, injected at construction
#[derive(Clone)]
pub struct SyncContext {
    pub api: Arc<dyn NotificationApi>,
    pub transport: Arc<dyn Transport>,
    pub auth: Arc<dyn AuthProvider>,
    pub errors: Arc<dyn ErrorSink>,
    pub sanitizer: Arc<dyn Sanitizer>,
    pub config: SyncConfig,
}

impl SyncContext {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            transport,
            auth,
            errors: Arc::new(TracingSink),
            sanitizer: Arc::new(StripTags),
            config,
        }
    }

    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}
