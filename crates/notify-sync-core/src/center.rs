//! Public facade over one user's notification session.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use crate::bus::{NoticeKind, Subscription, SyncNotice};
use crate::error::SyncError;
use crate::models::{Notification, UpdateStatus};
use crate::sync::{
    events, NavigationWatcher, ReconcileTrigger, Reconciler, Session, SyncContext, VisitOutcome,
};
use crate::transport::{ConnectionState, OutboundEvent};

/// Owns a session from login (`start`) to logout (`shutdown` or drop).
///
/// Reads never wait on the network: they return the current optimistic or
/// stale snapshot while requests are in flight.
pub struct NotificationCenter {
    session: Arc<Session>,
    reconciler: Reconciler,
    navigation: NavigationWatcher,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationCenter {
    pub fn new(ctx: SyncContext) -> Self {
        let session = Session::new(ctx);
        Self {
            reconciler: Reconciler::new(session.clone()),
            navigation: NavigationWatcher::new(session.clone()),
            session,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::spawn(future));
    }

    // ===== Lifecycle =====

    /// Connect the transport and run the mount reconciliation.
    /// Without a token nothing is started and an `Auth` error is returned.
    pub async fn start(&self) -> Result<(), SyncError> {
        let token = match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                self.session.record_error(&e);
                return Err(e);
            }
        };

        let transport = self.session.ctx.transport.clone();
        let frames = transport.connect(&token);
        self.spawn(events::run_frames(self.session.clone(), frames));
        self.spawn(events::run_connection(
            self.session.clone(),
            self.reconciler.clone(),
            transport.state(),
        ));

        info!("Notification session started");
        self.reconciler.reconcile(ReconcileTrigger::Mount).await
    }

    /// Logout: stop background work and discard all session state
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.session.ctx.transport.disconnect();
        self.session.with_state(|s| {
            s.clear();
            s.connection = ConnectionState::Closed;
        });
        info!("Notification session shut down");
    }

    // ===== Read-only state =====

    pub fn notifications(&self) -> Vec<Notification> {
        self.session.read(|s| s.store.notifications().to_vec())
    }

    pub fn unread_count(&self) -> u64 {
        self.session.read(|s| s.store.unread_count())
    }

    pub fn is_connected(&self) -> bool {
        self.session.read(|s| s.connection == ConnectionState::Open)
    }

    pub fn is_loading(&self) -> bool {
        self.session.read(|s| s.loading > 0)
    }

    pub fn error(&self) -> Option<SyncError> {
        self.session.read(|s| s.error.clone())
    }

    pub fn current_path(&self) -> Option<String> {
        self.session.read(|s| s.current_path.clone())
    }

    pub fn subscribe<F>(&self, kind: NoticeKind, handler: F) -> Subscription
    where
        F: Fn(&SyncNotice) + Send + Sync + 'static,
    {
        self.session.bus().subscribe(kind, handler)
    }

    // ===== Mutations =====

    /// Optimistically mark one notification read.
    ///
    /// A call for an id that is unknown or already read returns `Ok` without
    /// touching the server. On failure the prior list and count are restored.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), SyncError> {
        let token = match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                self.session.surface_error(&e);
                return Err(e);
            }
        };

        let Some((op, count)) = self.session.with_state(|s| {
            s.store
                .mark_one_optimistic(id)
                .map(|op| (op, s.store.unread_count()))
        }) else {
            debug!(id = %id, "Already read; nothing to do");
            return Ok(());
        };
        self.session.publish(vec![
            SyncNotice::NotificationUpdated {
                id: id.to_string(),
                status: UpdateStatus::Read,
            },
            SyncNotice::CountChanged(count),
        ]);

        match self.session.ctx.api.mark_one_read(&token, id).await {
            Ok(()) => {
                self.session.with_state(|s| s.links.remove(id));
                self.session
                    .ctx
                    .transport
                    .send(OutboundEvent::MarkRead { id: id.to_string() });
                let _ = self.reconciler.reconcile(ReconcileTrigger::AfterMutation).await;
                Ok(())
            }
            Err(e) => {
                let count = self.session.with_state(|s| {
                    s.store.rollback(op);
                    s.store.unread_count()
                });
                self.session.publish(vec![SyncNotice::CountChanged(count)]);
                self.session.surface_error(&e);
                Err(e)
            }
        }
    }

    pub async fn mark_all_as_read(&self) -> Result<(), SyncError> {
        let token = match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                self.session.surface_error(&e);
                return Err(e);
            }
        };

        let op = self.session.with_state(|s| s.store.mark_all_optimistic());
        self.session.publish(vec![SyncNotice::CountChanged(0)]);

        match self.session.ctx.api.mark_all_read(&token).await {
            Ok(()) => {
                self.session.with_state(|s| s.links.clear());
                self.session.ctx.transport.send(OutboundEvent::MarkAllRead);
                let _ = self.reconciler.reconcile(ReconcileTrigger::AfterMutation).await;
                Ok(())
            }
            Err(e) => {
                let count = self.session.with_state(|s| {
                    s.store.rollback(op);
                    s.store.unread_count()
                });
                self.session.publish(vec![SyncNotice::CountChanged(count)]);
                self.session.surface_error(&e);
                Err(e)
            }
        }
    }

    pub async fn refresh_notifications(&self) -> Result<(), SyncError> {
        self.reconciler.reconcile(ReconcileTrigger::Manual).await
    }

    // ===== Navigation =====

    /// Run the auto-mark batch for `path` and wait for it
    pub async fn visit(&self, path: &str) -> VisitOutcome {
        self.navigation.visit(path).await
    }

    /// Report a route change; the mark batch runs in the background
    pub fn navigate(&self, path: &str) {
        let navigation = self.navigation.clone();
        let path = path.to_string();
        self.spawn(async move {
            navigation.visit(&path).await;
        });
    }

    /// Follow a routing collaborator's current path
    pub fn watch_navigation(&self, mut paths: watch::Receiver<String>) {
        let navigation = self.navigation.clone();
        self.spawn(async move {
            // Visits die with this task, so shutdown cancels pending debounces
            let mut visits = JoinSet::new();
            loop {
                let path = paths.borrow_and_update().clone();
                let navigation = navigation.clone();
                // Each visit runs on its own so a debounce never delays the next route
                visits.spawn(async move {
                    navigation.visit(&path).await;
                });
                while visits.try_join_next().is_some() {}
                if paths.changed().await.is_err() {
                    break;
                }
            }
            while visits.join_next().await.is_some() {}
        });
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        self.session.ctx.transport.disconnect();
    }
}
