//! Auto-mark notifications read when the user visits their target page.
//!
//! Per path the watcher is either idle or marking. Entering `Marking` pulls
//! the path's ids out of the link index right away, waits out the debounce,
//! then marks every id in parallel. Ids that fail go back into the index so
//! the next visit (or reconciliation) picks them up.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::Session;
use crate::bus::SyncNotice;
use crate::models::UpdateStatus;
use crate::transport::OutboundEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Nothing unread points at this path
    Idle,
    /// A batch for this path is already in flight
    AlreadyMarking,
    /// The user navigated away during the debounce window
    Abandoned,
    Marked {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },
}

#[derive(Clone)]
pub struct NavigationWatcher {
    session: Arc<Session>,
}

impl NavigationWatcher {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Record `path` as current and run the mark batch for it, if any
    pub async fn visit(&self, path: &str) -> VisitOutcome {
        let entered = self.session.with_state(|s| {
            let path = s.links.normalize(path);
            s.current_path = Some(path.clone());
            if s.marking.contains(&path) {
                return Err(VisitOutcome::AlreadyMarking);
            }
            match s.links.take(&path) {
                Some(ids) if !ids.is_empty() => {
                    s.marking.insert(path.clone());
                    let mut ids: Vec<String> = ids.into_iter().collect();
                    ids.sort();
                    Ok((path, ids, s.epoch))
                }
                _ => Err(VisitOutcome::Idle),
            }
        });
        let (path, ids, epoch) = match entered {
            Ok(entered) => entered,
            Err(outcome) => return outcome,
        };

        debug!(path = %path, count = ids.len(), "Entering marking state");
        tokio::time::sleep(self.session.ctx.config.debounce()).await;

        let still_here = self.session.read(|s| {
            s.epoch == epoch && s.current_path.as_deref() == Some(path.as_str())
        });
        if !still_here {
            debug!(path = %path, "Route changed during debounce; restoring index entries");
            self.finish(&path, &ids, epoch);
            return VisitOutcome::Abandoned;
        }

        let token = match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                self.session.record_error(&e);
                self.finish(&path, &ids, epoch);
                return VisitOutcome::Marked {
                    succeeded: Vec::new(),
                    failed: ids,
                };
            }
        };

        let api = &self.session.ctx.api;
        let results = join_all(ids.iter().map(|id| {
            let token = token.as_str();
            async move { (id.clone(), api.mark_one_read(token, id).await) }
        }))
        .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => succeeded.push(id),
                Err(e) => {
                    warn!(id = %id, error = %e, "Auto mark-as-read failed; will retry later");
                    failed.push(id);
                }
            }
        }

        let notices = self.session.with_state(|s| {
            let mut notices = Vec::new();
            if s.epoch != epoch {
                return None;
            }
            for id in &succeeded {
                if s.store.apply_update(id, UpdateStatus::Read) {
                    notices.push(SyncNotice::NotificationUpdated {
                        id: id.clone(),
                        status: UpdateStatus::Read,
                    });
                }
            }
            if !notices.is_empty() {
                notices.push(SyncNotice::CountChanged(s.store.unread_count()));
            }
            Some(notices)
        });
        let Some(notices) = notices else {
            debug!(path = %path, "Session ended while marking; discarding results");
            return VisitOutcome::Abandoned;
        };
        self.session.publish(notices);

        for id in &succeeded {
            self.session
                .ctx
                .transport
                .send(OutboundEvent::MarkRead { id: id.clone() });
        }

        self.finish(&path, &failed, epoch);
        VisitOutcome::Marked { succeeded, failed }
    }

    /// Leave `Marking`, putting `restore` back under `path`.
    /// A cleared session keeps its empty index.
    fn finish(&self, path: &str, restore: &[String], epoch: u64) {
        self.session.with_state(|s| {
            if s.epoch != epoch {
                return;
            }
            for id in restore {
                // A reconciliation may have reindexed it meanwhile
                if s.links.path_of(id).is_none() {
                    s.links.add(id, path);
                }
            }
            s.marking.remove(path);
        });
    }
}
