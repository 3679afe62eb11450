//! Glue between the transport and the session: inbound frames are applied in
//! arrival order, and the connection state drives reconnect reconciliation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{ReconcileTrigger, Reconciler, Session};
use crate::bus::SyncNotice;
use crate::transport::{ConnectionEdge, ConnectionState, InboundEvent};

/// Apply one raw frame. Malformed frames are logged and dropped.
pub fn apply_frame(session: &Session, frame: &str) {
    let event = match InboundEvent::parse(frame) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, frame = %frame, "Dropping malformed transport frame");
            return;
        }
    };
    debug!(kind = event.kind(), "Applying transport event");
    let notices = apply_event(session, event);
    session.publish(notices);
}

fn apply_event(session: &Session, event: InboundEvent) -> Vec<SyncNotice> {
    match event {
        InboundEvent::New { notification } => {
            let notification = notification.sanitized(session.ctx.sanitizer.as_ref());
            session.with_state(|s| {
                if !s.store.apply_new_notification(notification.clone()) {
                    return Vec::new();
                }
                if !notification.is_read {
                    s.links.add(&notification.id, &notification.link);
                }
                vec![
                    SyncNotice::NotificationAdded(notification),
                    SyncNotice::CountChanged(s.store.unread_count()),
                ]
            })
        }
        InboundEvent::Update { id, status } => session.with_state(|s| {
            s.links.remove(&id);
            if !s.store.apply_update(&id, status) {
                return Vec::new();
            }
            vec![
                SyncNotice::NotificationUpdated { id, status },
                SyncNotice::CountChanged(s.store.unread_count()),
            ]
        }),
        InboundEvent::Count { unread_count } => {
            let count = unread_count.max(0) as u64;
            session.with_state(|s| {
                s.store.apply_count_override(count);
                if count == 0 {
                    s.links.clear();
                }
            });
            vec![SyncNotice::CountChanged(count)]
        }
    }
}

/// Consume frames until the transport drops its sender
pub async fn run_frames(session: Arc<Session>, mut frames: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = frames.recv().await {
        apply_frame(&session, &frame);
    }
    debug!("Transport frame stream ended");
}

/// Track connection state and reconcile on every reconnect edge.
/// A hung reconciliation never stalls state tracking or later edges.
pub async fn run_connection(
    session: Arc<Session>,
    reconciler: Reconciler,
    mut state_rx: watch::Receiver<ConnectionState>,
) {
    // The transport was just asked to connect, so the first Open is not a reconnect
    let mut edge = ConnectionEdge::new(ConnectionState::Connecting);
    let initial = *state_rx.borrow_and_update();
    edge.observe(initial);
    session.with_state(|s| s.connection = initial);

    // Owned here so aborting this task also aborts reconciliations in flight
    let mut reconciles = JoinSet::new();

    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        let previous = session.with_state(|s| std::mem::replace(&mut s.connection, state));
        if previous != state {
            session.publish(vec![SyncNotice::ConnectionChanged(state)]);
        }
        while reconciles.try_join_next().is_some() {}
        if edge.observe(state) {
            debug!("Transport reconnected");
            let reconciler = reconciler.clone();
            // Failures are recorded by the reconciler; the next edge retries
            reconciles.spawn(async move {
                let _ = reconciler.reconcile(ReconcileTrigger::Reconnect).await;
            });
        }
    }
}
