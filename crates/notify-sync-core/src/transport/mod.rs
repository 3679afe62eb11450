//! Live push channel contract.
//!
//! The core only consumes frames in order, watches the connection state for
//! the reconnect edge, and fires broadcasts. Reconnect and backoff belong to
//! the implementation.

pub mod socket_client;
pub mod types;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

pub use socket_client::SocketTransport;
pub use types::{InboundEvent, OutboundEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

pub trait Transport: Send + Sync {
    /// Start delivering raw frames. Frames arrive on the returned receiver in
    /// the order the transport received them.
    fn connect(&self, token: &str) -> mpsc::UnboundedReceiver<String>;

    /// Fire-and-forget broadcast
    fn send(&self, event: OutboundEvent);

    fn state(&self) -> watch::Receiver<ConnectionState>;

    fn disconnect(&self);
}

/// Remembers the last observed state so only a `Closed -> Open` transition
/// counts as a reconnect. `Connecting` is transient and does not break the
/// edge, so `Closed -> Connecting -> Open` still counts.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEdge {
    previous: ConnectionState,
    settled: Option<ConnectionState>,
}

impl ConnectionEdge {
    pub fn new(initial: ConnectionState) -> Self {
        let settled = (initial != ConnectionState::Connecting).then_some(initial);
        Self {
            previous: initial,
            settled,
        }
    }

    pub fn previous(&self) -> ConnectionState {
        self.previous
    }

    /// Record `next`; true when it completes a reconnect
    pub fn observe(&mut self, next: ConnectionState) -> bool {
        self.previous = next;
        if next == ConnectionState::Connecting {
            return false;
        }
        let reconnected =
            self.settled == Some(ConnectionState::Closed) && next == ConnectionState::Open;
        self.settled = Some(next);
        reconnected
    }
}
