pub mod api;
pub mod bus;
pub mod center;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod sanitize;
pub mod store;
pub mod sync;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the session-facing types at crate root for convenience
pub use center::NotificationCenter;
pub use config::{QueryIdentityRoute, SyncConfig};
pub use error::SyncError;
pub use models::{Notification, NotificationPage, UnreadLink, UpdateStatus};
pub use sync::{AuthProvider, ErrorSink, SyncContext, TracingSink};
