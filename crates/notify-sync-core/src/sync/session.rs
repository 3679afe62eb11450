use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::SyncContext;
use crate::bus::{EventBus, SyncNotice};
use crate::error::SyncError;
use crate::store::{LinkIndex, NotificationStore};
use crate::transport::ConnectionState;

/// Mutable state owned by one session.
#[derive(Debug)]
pub struct SessionState {
    pub store: NotificationStore,
    pub links: LinkIndex,
    pub connection: ConnectionState,
    /// Reconciliations in flight
    pub loading: usize,
    pub error: Option<SyncError>,
    /// Normalized paths with a mark batch in flight
    pub marking: HashSet<String>,
    pub current_path: Option<String>,
    /// Bumped on every `clear`; work started under an older epoch is stale
    pub epoch: u64,
}

impl SessionState {
    fn new(ctx: &SyncContext) -> Self {
        Self {
            store: NotificationStore::new(),
            links: LinkIndex::new(ctx.config.query_identity_routes.clone()),
            connection: ConnectionState::Closed,
            loading: 0,
            error: None,
            marking: HashSet::new(),
            current_path: None,
            epoch: 0,
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.links.clear();
        self.loading = 0;
        self.error = None;
        self.marking.clear();
        self.current_path = None;
        self.epoch += 1;
    }
}

/// Shared core of a [`NotificationCenter`](crate::NotificationCenter).
///
/// The lock is only taken for synchronous sections; nothing awaits while
/// holding it, and notices are published after it is released so handlers can
/// read the session.
pub struct Session {
    pub(crate) ctx: SyncContext,
    state: Mutex<SessionState>,
    pub(crate) bus: EventBus,
}

impl Session {
    pub fn new(ctx: SyncContext) -> Arc<Self> {
        let state = SessionState::new(&ctx);
        Arc::new(Self {
            ctx,
            state: Mutex::new(state),
            bus: EventBus::new(),
        })
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    pub fn publish(&self, notices: Vec<SyncNotice>) {
        self.bus.publish_all(notices);
    }

    /// No request is made without a token; callers record the `Auth` error
    pub fn token(&self) -> Result<String, SyncError> {
        match self.ctx.auth.token() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(SyncError::Auth("No session token available".to_string())),
        }
    }

    /// Record an error as the session's current error and publish it
    pub fn record_error(&self, error: &SyncError) {
        self.with_state(|s| s.error = Some(error.clone()));
        if error.is_auth() {
            self.ctx.auth.on_auth_error(error);
        }
        self.bus.publish(&SyncNotice::Error(error.clone()));
    }

    /// Record the error and also hand it to the user-facing sink
    pub fn surface_error(&self, error: &SyncError) {
        self.record_error(error);
        self.ctx.errors.report(error);
    }
}
