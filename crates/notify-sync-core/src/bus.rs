//! Typed change notifications for consumers of a session.
//!
//! `subscribe` returns a [`Subscription`]; dropping it unregisters the
//! handler, so a consumer that goes away cannot leak a listener.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::SyncError;
use crate::models::{Notification, UpdateStatus};
use crate::transport::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    NotificationAdded,
    NotificationUpdated,
    CountChanged,
    Reconciled,
    ConnectionChanged,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotice {
    NotificationAdded(Notification),
    NotificationUpdated { id: String, status: UpdateStatus },
    CountChanged(u64),
    /// Local state was replaced by a server snapshot
    Reconciled { total: usize, unread_count: u64 },
    ConnectionChanged(ConnectionState),
    Error(SyncError),
}

impl SyncNotice {
    pub fn kind(&self) -> NoticeKind {
        match self {
            SyncNotice::NotificationAdded(_) => NoticeKind::NotificationAdded,
            SyncNotice::NotificationUpdated { .. } => NoticeKind::NotificationUpdated,
            SyncNotice::CountChanged(_) => NoticeKind::CountChanged,
            SyncNotice::Reconciled { .. } => NoticeKind::Reconciled,
            SyncNotice::ConnectionChanged(_) => NoticeKind::ConnectionChanged,
            SyncNotice::Error(_) => NoticeKind::Error,
        }
    }
}

type Handler = Arc<dyn Fn(&SyncNotice) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<NoticeKind, Vec<(u64, Handler)>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: NoticeKind, handler: F) -> Subscription
    where
        F: Fn(&SyncNotice) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Handlers run synchronously, in subscription order, after the registry
    /// lock is released.
    pub fn publish(&self, notice: &SyncNotice) {
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock();
            match registry.handlers.get(&notice.kind()) {
                Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
                None => return,
            }
        };
        for handler in handlers {
            handler(notice);
        }
    }

    pub fn publish_all(&self, notices: impl IntoIterator<Item = SyncNotice>) {
        for notice in notices {
            self.publish(&notice);
        }
    }

    pub fn subscriber_count(&self, kind: NoticeKind) -> usize {
        self.registry
            .lock()
            .handlers
            .get(&kind)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

/// Disposer for a handler registered with [`EventBus::subscribe`]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: NoticeKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> NoticeKind {
        self.kind
    }

    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock();
        if let Some(handlers) = registry.handlers.get_mut(&self.kind) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                registry.handlers.remove(&self.kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, kind: NoticeKind) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let sub = bus.subscribe(kind, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_only_matching_kind_delivered() {
        let bus = EventBus::new();
        let (counts, _sub) = counter(&bus, NoticeKind::CountChanged);
        let (errors, _sub2) = counter(&bus, NoticeKind::Error);

        bus.publish(&SyncNotice::CountChanged(3));
        bus.publish(&SyncNotice::CountChanged(2));

        assert_eq!(counts.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let (hits, sub) = counter(&bus, NoticeKind::CountChanged);
        assert_eq!(bus.subscriber_count(NoticeKind::CountChanged), 1);

        sub.dispose();
        bus.publish(&SyncNotice::CountChanged(1));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(NoticeKind::CountChanged), 0);
    }

    #[test]
    fn test_handler_can_touch_bus_while_publishing() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let _sub = bus.subscribe(NoticeKind::Reconciled, move |_| {
            // Would deadlock if publish held the registry lock
            let nested = inner.subscribe(NoticeKind::Error, |_| {});
            drop(nested);
        });
        bus.publish(&SyncNotice::Reconciled {
            total: 0,
            unread_count: 0,
        });
        assert_eq!(bus.subscriber_count(NoticeKind::Error), 0);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let (_, sub) = counter(&bus, NoticeKind::Error);
        drop(bus);
        drop(sub);
    }
}
