pub mod link_index;
pub mod notification_store;
pub mod reducer;

pub use link_index::{normalize_link, LinkIndex};
pub use notification_store::NotificationStore;
pub use reducer::{reduce, NotificationState, PendingOptimisticOp, StoreEvent};
