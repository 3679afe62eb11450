pub mod notification;

pub use notification::{Notification, NotificationPage, UnreadLink, UpdateStatus};
