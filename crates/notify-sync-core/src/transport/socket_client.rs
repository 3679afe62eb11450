use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ConnectionState, OutboundEvent, Transport};
use crate::config::SyncConfig;

/// Newline-delimited JSON push channel over a unix socket.
///
/// The first line written after connecting is `{"type":"auth","token":...}`.
/// Reconnects on a fixed delay until disconnected or the frame receiver is
/// dropped.
pub struct SocketTransport {
    socket_path: PathBuf,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    outbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename = "auth")]
struct AuthFrame<'a> {
    token: &'a str,
}

enum StreamEnd {
    /// Peer closed the socket; try again
    Disconnected,
    /// Nobody is listening for frames anymore
    ReceiverDropped,
}

impl SocketTransport {
    pub fn new<P: AsRef<Path>>(socket_path: P, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            reconnect_delay,
            state_tx,
            outbound_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.socket_path, config.reconnect_delay())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn run(
        socket_path: PathBuf,
        token: String,
        reconnect_delay: Duration,
        state_tx: watch::Sender<ConnectionState>,
        frame_tx: mpsc::UnboundedSender<String>,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            state_tx.send_replace(ConnectionState::Connecting);

            match UnixStream::connect(&socket_path).await {
                Ok(stream) => {
                    debug!(path = ?socket_path, "Connected to notification socket");
                    match Self::read_stream(stream, &token, &state_tx, &frame_tx, &mut outbound_rx)
                        .await
                    {
                        Ok(StreamEnd::ReceiverDropped) => {
                            state_tx.send_replace(ConnectionState::Closed);
                            return;
                        }
                        Ok(StreamEnd::Disconnected) => {
                            debug!("Notification socket disconnected");
                        }
                        Err(e) => {
                            warn!(error = %e, "Notification socket read error");
                        }
                    }
                }
                Err(e) => {
                    debug!(path = ?socket_path, error = %e, "Failed to connect to notification socket");
                }
            }

            state_tx.send_replace(ConnectionState::Closed);
            if frame_tx.is_closed() {
                return;
            }
            tokio::time::sleep(reconnect_delay).await;
        }
    }

    async fn read_stream(
        stream: UnixStream,
        token: &str,
        state_tx: &watch::Sender<ConnectionState>,
        frame_tx: &mpsc::UnboundedSender<String>,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<StreamEnd, std::io::Error> {
        let (read_half, mut write_half) = stream.into_split();

        let auth = serde_json::to_string(&AuthFrame { token })?;
        write_half.write_all(auth.as_bytes()).await?;
        write_half.write_all(b"\n").await?;

        state_tx.send_replace(ConnectionState::Open);

        let mut lines = BufReader::new(read_half).lines();
        let mut outbound_open = true;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(StreamEnd::Disconnected);
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if frame_tx.send(line).is_err() {
                        debug!("Frame receiver dropped");
                        return Ok(StreamEnd::ReceiverDropped);
                    }
                }
                frame = outbound_rx.recv(), if outbound_open => {
                    match frame {
                        Some(frame) => {
                            write_half.write_all(frame.as_bytes()).await?;
                            write_half.write_all(b"\n").await?;
                        }
                        None => outbound_open = false,
                    }
                }
            }
        }
    }
}

impl Transport for SocketTransport {
    fn connect(&self, token: &str) -> mpsc::UnboundedReceiver<String> {
        self.disconnect();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "SocketTransport::connect called outside a tokio runtime");
                return frame_rx;
            }
        };

        *self.outbound_tx.lock() = Some(outbound_tx);
        // Observers subscribing right after connect must not see a stale Closed
        self.state_tx.send_replace(ConnectionState::Connecting);
        let task = handle.spawn(Self::run(
            self.socket_path.clone(),
            token.to_string(),
            self.reconnect_delay,
            self.state_tx.clone(),
            frame_tx,
            outbound_rx,
        ));
        *self.task.lock() = Some(task);
        frame_rx
    }

    fn send(&self, event: OutboundEvent) {
        if *self.state_tx.borrow() != ConnectionState::Open {
            debug!(?event, "Dropping broadcast while socket is not open");
            return;
        }
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode broadcast");
                return;
            }
        };
        if let Some(tx) = self.outbound_tx.lock().as_ref() {
            let _ = tx.send(frame);
        }
    }

    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn disconnect(&self) {
        self.outbound_tx.lock().take();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.state_tx.send_replace(ConnectionState::Closed);
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}
