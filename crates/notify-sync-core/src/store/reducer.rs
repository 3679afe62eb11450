//! Pure state transitions for the notification list.
//!
//! Every store mutation goes through [`reduce`], so the rules for counting
//! and deduplication live in one place and can be tested without a session.

use std::collections::HashSet;

use crate::models::{Notification, UpdateStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    /// Newest first
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

/// Snapshot taken before an optimistic mutation.
/// Dropped on success, replayed through [`StoreEvent::Restore`] on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOptimisticOp {
    pub previous_notifications: Vec<Notification>,
    pub previous_unread_count: u64,
}

impl PendingOptimisticOp {
    pub(crate) fn capture(state: &NotificationState) -> Self {
        Self {
            previous_notifications: state.notifications.clone(),
            previous_unread_count: state.unread_count,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Canonical snapshot from the server; replaces everything
    Initialize {
        notifications: Vec<Notification>,
        unread_count: u64,
    },
    New(Notification),
    Update {
        id: String,
        status: UpdateStatus,
    },
    /// Server-authoritative count; zero means "all clear"
    CountOverride(u64),
    MarkAllRead,
    Restore(PendingOptimisticOp),
}

pub fn reduce(mut state: NotificationState, event: StoreEvent) -> NotificationState {
    match event {
        StoreEvent::Initialize {
            notifications,
            unread_count,
        } => {
            let mut seen = HashSet::with_capacity(notifications.len());
            state.notifications = notifications
                .into_iter()
                .filter(|n| seen.insert(n.id.clone()))
                .collect();
            state.unread_count = unread_count;
        }
        StoreEvent::New(notification) => {
            if state.notifications.iter().any(|n| n.id == notification.id) {
                return state;
            }
            if !notification.is_read {
                state.unread_count += 1;
            }
            state.notifications.insert(0, notification);
        }
        StoreEvent::Update {
            id,
            status: UpdateStatus::Read,
        } => {
            if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
                if !n.is_read {
                    n.is_read = true;
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }
        StoreEvent::Update {
            id,
            status: UpdateStatus::Deleted,
        } => {
            if let Some(pos) = state.notifications.iter().position(|n| n.id == id) {
                let removed = state.notifications.remove(pos);
                if !removed.is_read {
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }
        StoreEvent::CountOverride(count) => {
            state.unread_count = count;
            if count == 0 {
                mark_all(&mut state.notifications);
            }
        }
        StoreEvent::MarkAllRead => {
            mark_all(&mut state.notifications);
            state.unread_count = 0;
        }
        StoreEvent::Restore(op) => {
            state.notifications = op.previous_notifications;
            state.unread_count = op.previous_unread_count;
        }
    }
    state
}

fn mark_all(notifications: &mut [Notification]) {
    for n in notifications.iter_mut() {
        n.is_read = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::notification;

    fn state_with(items: Vec<Notification>) -> NotificationState {
        let unread_count = items.iter().filter(|n| !n.is_read).count() as u64;
        NotificationState {
            notifications: items,
            unread_count,
        }
    }

    #[test]
    fn test_new_prepends_and_counts() {
        let state = state_with(vec![notification("n1")]);
        let state = reduce(state, StoreEvent::New(notification("n2")));
        assert_eq!(state.notifications[0].id, "n2");
        assert_eq!(state.unread_count, 2);
    }

    #[test]
    fn test_new_duplicate_is_noop() {
        let state = state_with(vec![notification("n1")]);
        let before = state.clone();
        let after = reduce(state, StoreEvent::New(notification("n1")));
        assert_eq!(after, before);
    }

    #[test]
    fn test_new_already_read_does_not_count() {
        let mut n = notification("n1");
        n.is_read = true;
        let state = reduce(NotificationState::default(), StoreEvent::New(n));
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn test_initialize_dedupes_keeping_first() {
        let mut dup = notification("n1");
        dup.title = "second".to_string();
        let state = reduce(
            NotificationState::default(),
            StoreEvent::Initialize {
                notifications: vec![notification("n1"), dup, notification("n2")],
                unread_count: 7,
            },
        );
        assert_eq!(state.notifications.len(), 2);
        assert_eq!(state.notifications[0].title, "Notification n1");
        // Server count is trusted as-is
        assert_eq!(state.unread_count, 7);
    }

    #[test]
    fn test_update_read_twice_decrements_once() {
        let state = state_with(vec![notification("n1"), notification("n2")]);
        let read = || StoreEvent::Update {
            id: "n1".to_string(),
            status: UpdateStatus::Read,
        };
        let state = reduce(state, read());
        let state = reduce(state, read());
        assert_eq!(state.unread_count, 1);
        assert!(state.notifications.iter().find(|n| n.id == "n1").unwrap().is_read);
    }

    #[test]
    fn test_update_deleted_removes() {
        let mut read = notification("n2");
        read.is_read = true;
        let state = state_with(vec![notification("n1"), read]);

        let state = reduce(
            state,
            StoreEvent::Update {
                id: "n2".to_string(),
                status: UpdateStatus::Deleted,
            },
        );
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.unread_count, 1);

        let state = reduce(
            state,
            StoreEvent::Update {
                id: "n1".to_string(),
                status: UpdateStatus::Deleted,
            },
        );
        assert!(state.notifications.is_empty());
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let state = state_with(vec![notification("n1")]);
        let after = reduce(
            state.clone(),
            StoreEvent::Update {
                id: "missing".to_string(),
                status: UpdateStatus::Deleted,
            },
        );
        assert_eq!(after, state);
    }

    #[test]
    fn test_count_override_zero_clears_everything() {
        let state = state_with(vec![notification("n1"), notification("n2")]);
        let state = reduce(state, StoreEvent::CountOverride(0));
        assert_eq!(state.unread_count, 0);
        assert!(state.notifications.iter().all(|n| n.is_read));
    }

    #[test]
    fn test_count_override_nonzero_keeps_flags() {
        let state = state_with(vec![notification("n1")]);
        let state = reduce(state, StoreEvent::CountOverride(12));
        assert_eq!(state.unread_count, 12);
        assert!(!state.notifications[0].is_read);
    }

    #[test]
    fn test_restore_replays_snapshot() {
        let state = state_with(vec![notification("n1"), notification("n2")]);
        let op = PendingOptimisticOp::capture(&state);
        let marked = reduce(state.clone(), StoreEvent::MarkAllRead);
        assert_eq!(marked.unread_count, 0);
        let restored = reduce(marked, StoreEvent::Restore(op));
        assert_eq!(restored, state);
    }
}
