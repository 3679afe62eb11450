//! In-memory collaborators shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::api::NotificationApi;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::{Notification, NotificationPage, UnreadLink};
use crate::sync::{AuthProvider, ErrorSink, StaticToken, SyncContext};
use crate::transport::{ConnectionState, OutboundEvent, Transport};

pub fn notification(id: &str) -> Notification {
    Notification {
        id: id.to_string(),
        title: format!("Notification {}", id),
        description: String::new(),
        link: String::new(),
        is_read: false,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub fn linked(id: &str, link: &str) -> Notification {
    let mut n = notification(id);
    n.link = link.to_string();
    n
}

/// Let spawned tasks run until they are all waiting
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Default)]
struct FakeServer {
    notifications: Vec<Notification>,
    links: Vec<UnreadLink>,
    fail_fetch: bool,
    fail_marks: HashSet<String>,
    fail_mark_all: bool,
    fetch_delay: Duration,
    mark_delay: Duration,
    fetch_calls: usize,
    mark_one_calls: Vec<String>,
    mark_all_calls: usize,
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Behaves like a tiny notification server
#[derive(Default)]
pub struct FakeApi {
    server: Mutex<FakeServer>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Links are derived from the unread notifications that carry one
    pub fn seed(&self, notifications: Vec<Notification>) {
        let mut server = self.server.lock();
        server.links = notifications
            .iter()
            .filter(|n| !n.is_read && !n.link.is_empty())
            .map(|n| UnreadLink::new(n.id.clone(), n.link.clone()))
            .collect();
        server.notifications = notifications;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.server.lock().fail_fetch = fail;
    }

    pub fn fail_mark(&self, id: &str) {
        self.server.lock().fail_marks.insert(id.to_string());
    }

    pub fn set_fail_mark_all(&self, fail: bool) {
        self.server.lock().fail_mark_all = fail;
    }

    /// Hold every list fetch in flight for `delay`; calls count when they start
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.server.lock().fetch_delay = delay;
    }

    pub fn set_mark_delay(&self, delay: Duration) {
        self.server.lock().mark_delay = delay;
    }

    pub fn fetch_calls(&self) -> usize {
        self.server.lock().fetch_calls
    }

    pub fn mark_one_calls(&self) -> Vec<String> {
        self.server.lock().mark_one_calls.clone()
    }

    pub fn mark_all_calls(&self) -> usize {
        self.server.lock().mark_all_calls
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_notifications(
        &self,
        _token: &str,
        limit: usize,
    ) -> Result<NotificationPage, SyncError> {
        let delay = {
            let mut server = self.server.lock();
            server.fetch_calls += 1;
            server.fetch_delay
        };
        pause(delay).await;

        let server = self.server.lock();
        if server.fail_fetch {
            return Err(SyncError::Network("fetch failed".to_string()));
        }
        let unread_count = server.notifications.iter().filter(|n| !n.is_read).count() as i64;
        Ok(NotificationPage {
            notifications: server.notifications.iter().take(limit).cloned().collect(),
            unread_count,
        })
    }

    async fn fetch_unread_links(&self, _token: &str) -> Result<Vec<UnreadLink>, SyncError> {
        let server = self.server.lock();
        if server.fail_fetch {
            return Err(SyncError::Network("fetch failed".to_string()));
        }
        Ok(server.links.clone())
    }

    async fn mark_one_read(&self, _token: &str, id: &str) -> Result<(), SyncError> {
        let delay = {
            let mut server = self.server.lock();
            server.mark_one_calls.push(id.to_string());
            server.mark_delay
        };
        pause(delay).await;

        let mut server = self.server.lock();
        if server.fail_marks.contains(id) {
            return Err(SyncError::Network(format!("mark {} failed", id)));
        }
        if let Some(n) = server.notifications.iter_mut().find(|n| n.id == id) {
            n.is_read = true;
        }
        server.links.retain(|l| l.uid != id);
        Ok(())
    }

    async fn mark_all_read(&self, _token: &str) -> Result<(), SyncError> {
        let mut server = self.server.lock();
        server.mark_all_calls += 1;
        if server.fail_mark_all {
            return Err(SyncError::Network("mark all failed".to_string()));
        }
        for n in server.notifications.iter_mut() {
            n.is_read = true;
        }
        server.links.clear();
        Ok(())
    }
}

pub struct FakeTransport {
    frame_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    state_tx: watch::Sender<ConnectionState>,
    sent: Mutex<Vec<OutboundEvent>>,
    connects: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Open);
        Arc::new(Self {
            frame_tx: Mutex::new(None),
            state_tx,
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn push_frame(&self, frame: &str) {
        if let Some(tx) = self.frame_tx.lock().as_ref() {
            tx.send(frame.to_string()).unwrap();
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn connect(&self, _token: &str) -> mpsc::UnboundedReceiver<String> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.frame_tx.lock() = Some(tx);
        rx
    }

    fn send(&self, event: OutboundEvent) {
        self.sent.lock().push(event);
    }

    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn disconnect(&self) {
        self.frame_tx.lock().take();
        self.state_tx.send_replace(ConnectionState::Closed);
    }
}

/// Collects everything surfaced to the user
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<SyncError>>,
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &SyncError) {
        self.errors.lock().push(error.clone());
    }
}

/// Token that can be revoked mid-test
#[derive(Default)]
pub struct SwitchableAuth {
    pub token: Mutex<Option<String>>,
    pub auth_errors: AtomicUsize,
}

impl AuthProvider for SwitchableAuth {
    fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn on_auth_error(&self, _error: &SyncError) {
        self.auth_errors.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn context(api: Arc<FakeApi>, transport: Arc<FakeTransport>) -> SyncContext {
    SyncContext::new(
        api,
        transport,
        Arc::new(StaticToken::new("token")),
        SyncConfig::default(),
    )
}
