use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::Session;
use crate::bus::SyncNotice;
use crate::error::SyncError;
use crate::models::{NotificationPage, UnreadLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTrigger {
    Mount,
    Reconnect,
    AfterMutation,
    Manual,
}

impl fmt::Display for ReconcileTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileTrigger::Mount => "mount",
            ReconcileTrigger::Reconnect => "reconnect",
            ReconcileTrigger::AfterMutation => "after-mutation",
            ReconcileTrigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Replaces local state with the server's snapshot.
///
/// Last writer wins: overlapping reconciliations are not cancelled, the one
/// that resolves last simply overwrites the others. A failed fetch leaves the
/// current state untouched.
#[derive(Clone)]
pub struct Reconciler {
    session: Arc<Session>,
}

impl Reconciler {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub async fn reconcile(&self, trigger: ReconcileTrigger) -> Result<(), SyncError> {
        let token = match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                self.session.record_error(&e);
                return Err(e);
            }
        };

        debug!(%trigger, "Reconciling notifications");
        self.session.with_state(|s| s.loading += 1);

        let api = &self.session.ctx.api;
        let limit = self.session.ctx.config.notification_limit;
        let (page, links) = tokio::join!(
            api.fetch_notifications(&token, limit),
            api.fetch_unread_links(&token)
        );

        let result = match (page, links) {
            (Ok(page), Ok(links)) => {
                self.apply(page, links);
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        self.session
            .with_state(|s| s.loading = s.loading.saturating_sub(1));

        if let Err(e) = &result {
            warn!(%trigger, error = %e, "Reconciliation failed; keeping current state");
            self.session.record_error(e);
        }
        result
    }

    fn apply(&self, page: NotificationPage, links: Vec<UnreadLink>) {
        let unread_count = page.clamped_unread_count();
        let sanitizer = self.session.ctx.sanitizer.as_ref();
        let notifications: Vec<_> = page
            .notifications
            .into_iter()
            .map(|n| n.sanitized(sanitizer))
            .collect();

        // The list may already know some linked ids are read
        let read_ids: HashSet<&str> = notifications
            .iter()
            .filter(|n| n.is_read)
            .map(|n| n.id.as_str())
            .collect();
        let unread_links: Vec<UnreadLink> = links
            .into_iter()
            .filter(|l| !read_ids.contains(l.uid.as_str()))
            .collect();

        let total = notifications.len();
        self.session.with_state(|s| {
            s.store.initialize(notifications, unread_count);
            s.links.rebuild_from_server_list(&unread_links);
            s.error = None;
        });

        debug!(total, unread_count, "Reconciled notifications");
        self.session.publish(vec![
            SyncNotice::Reconciled {
                total,
                unread_count,
            },
            SyncNotice::CountChanged(unread_count),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Notification;
    use crate::test_support::{context, linked, notification, FakeApi, FakeTransport, SwitchableAuth};

    fn session_with(api: Arc<FakeApi>) -> Arc<Session> {
        Session::new(context(api, FakeTransport::new()))
    }

    #[tokio::test]
    async fn test_reconcile_replaces_state() {
        let api = FakeApi::new();
        let mut read = linked("n2", "/b");
        read.is_read = true;
        api.seed(vec![linked("n1", "/a"), read, notification("n3")]);
        let session = session_with(api.clone());

        session.with_state(|s| {
            s.store.apply_new_notification(notification("stale"));
            s.links.add("stale", "/stale");
        });

        Reconciler::new(session.clone())
            .reconcile(ReconcileTrigger::Manual)
            .await
            .unwrap();

        session.read(|s| {
            let ids: Vec<&str> = s.store.notifications().iter().map(|n| n.id.as_str()).collect();
            assert_eq!(ids, vec!["n1", "n2", "n3"]);
            assert_eq!(s.store.unread_count(), 2);
            assert!(s.links.contains_path("/a"));
            assert!(!s.links.contains_path("/stale"));
            assert!(!s.links.contains_path("/b"));
            assert_eq!(s.loading, 0);
        });
        assert_eq!(api.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_sanitizes() {
        let api = FakeApi::new();
        let mut n = notification("n1");
        n.title = "<b>Bold</b> move".to_string();
        api.seed(vec![n]);
        let session = session_with(api);

        Reconciler::new(session.clone())
            .reconcile(ReconcileTrigger::Mount)
            .await
            .unwrap();

        let title = session.read(|s| s.store.notifications()[0].title.clone());
        assert_eq!(title, "Bold move");
    }

    #[tokio::test]
    async fn test_failed_reconcile_keeps_state() {
        let api = FakeApi::new();
        api.seed(vec![notification("n1")]);
        let session = session_with(api.clone());
        let reconciler = Reconciler::new(session.clone());
        reconciler.reconcile(ReconcileTrigger::Mount).await.unwrap();

        api.seed(Vec::new());
        api.set_fail_fetch(true);
        let err = reconciler.reconcile(ReconcileTrigger::Reconnect).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));

        session.read(|s| {
            assert_eq!(s.store.notifications().len(), 1);
            assert_eq!(s.store.unread_count(), 1);
            assert_eq!(s.error, Some(err.clone()));
            assert_eq!(s.loading, 0);
        });

        // Next trigger retries and clears the error
        api.set_fail_fetch(false);
        reconciler.reconcile(ReconcileTrigger::Manual).await.unwrap();
        session.read(|s| {
            assert!(s.store.notifications().is_empty());
            assert!(s.error.is_none());
        });
    }

    #[tokio::test]
    async fn test_no_token_means_no_fetch() {
        let api = FakeApi::new();
        let auth = Arc::new(SwitchableAuth::default());
        let mut ctx = context(api.clone(), FakeTransport::new());
        ctx.auth = auth.clone();
        let session = Session::new(ctx);

        let err = Reconciler::new(session)
            .reconcile(ReconcileTrigger::Mount)
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert_eq!(api.fetch_calls(), 0);
        assert_eq!(auth.auth_errors.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_server_count_clamped() {
        let session = session_with(FakeApi::new());
        let reconciler = Reconciler::new(session.clone());
        reconciler.apply(
            NotificationPage {
                notifications: Vec::<Notification>::new(),
                unread_count: -4,
            },
            Vec::new(),
        );
        assert_eq!(session.read(|s| s.store.unread_count()), 0);
    }
}
