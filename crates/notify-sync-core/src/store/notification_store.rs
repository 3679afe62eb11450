use crate::models::{Notification, UpdateStatus};

use super::reducer::{reduce, NotificationState, PendingOptimisticOp, StoreEvent};

/// Canonical in-memory notification list and unread count for one session.
#[derive(Debug, Default)]
pub struct NotificationStore {
    state: NotificationState,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.state = NotificationState::default();
    }

    // ===== Getters =====

    pub fn notifications(&self) -> &[Notification] {
        &self.state.notifications
    }

    pub fn unread_count(&self) -> u64 {
        self.state.unread_count
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.state.notifications.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// True only for ids present in the list and not yet read
    pub fn is_unread(&self, id: &str) -> bool {
        self.get(id).map(|n| !n.is_read).unwrap_or(false)
    }

    // ===== Mutations =====

    fn dispatch(&mut self, event: StoreEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
    }

    /// Full replace from a reconciliation snapshot
    pub fn initialize(&mut self, notifications: Vec<Notification>, unread_count: u64) {
        self.dispatch(StoreEvent::Initialize {
            notifications,
            unread_count,
        });
    }

    /// Returns false when the id was already present
    pub fn apply_new_notification(&mut self, notification: Notification) -> bool {
        if self.contains(&notification.id) {
            return false;
        }
        self.dispatch(StoreEvent::New(notification));
        true
    }

    /// Returns true when the list or count changed
    pub fn apply_update(&mut self, id: &str, status: UpdateStatus) -> bool {
        let before_count = self.state.unread_count;
        let before_len = self.state.notifications.len();
        let was_unread = self.is_unread(id);
        self.dispatch(StoreEvent::Update {
            id: id.to_string(),
            status,
        });
        was_unread
            || before_count != self.state.unread_count
            || before_len != self.state.notifications.len()
    }

    pub fn apply_count_override(&mut self, count: u64) {
        self.dispatch(StoreEvent::CountOverride(count));
    }

    /// Flip one notification to read.
    /// `None` when the id is unknown or already read; there is nothing to undo.
    pub fn mark_one_optimistic(&mut self, id: &str) -> Option<PendingOptimisticOp> {
        if !self.is_unread(id) {
            return None;
        }
        let op = PendingOptimisticOp::capture(&self.state);
        self.dispatch(StoreEvent::Update {
            id: id.to_string(),
            status: UpdateStatus::Read,
        });
        Some(op)
    }

    pub fn mark_all_optimistic(&mut self) -> PendingOptimisticOp {
        let op = PendingOptimisticOp::capture(&self.state);
        self.dispatch(StoreEvent::MarkAllRead);
        op
    }

    pub fn rollback(&mut self, op: PendingOptimisticOp) {
        self.dispatch(StoreEvent::Restore(op));
    }
}
