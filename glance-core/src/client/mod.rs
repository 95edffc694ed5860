//! Viewer-side stream client.
//!
//! Connects to a stream server, authenticates, and parses the frame stream
//! on a reader task. Control commands go through a writer task so the
//! `set_*` calls never block.
//!
//! Frames, status changes and errors are published on an event channel;
//! delivery statistics on a `tokio::sync::watch` channel.

pub mod stats;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::{StreamEvent, ViewerCodec};
use crate::error::GlanceError;
use crate::protocol::{CONNECT_TIMEOUT, ClientLine, DEFAULT_SECRET};
use crate::state::ConnectionStatus;

pub use stats::DeliveryStats;

// ── ClientConfig ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Shared secret sent in the AUTH line.
    pub secret: String,
    /// TCP connect deadline.
    pub connect_timeout: Duration,
    /// Disconnect on unrecognised header lines instead of skipping them.
    pub strict_headers: bool,
    /// Control commands queued before `set_*` calls start dropping.
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            strict_headers: false,
            command_buffer: 32,
        }
    }
}

// ── ClientEvent ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Status(ConnectionStatus),
    /// One complete encoded frame.
    Frame(Bytes),
    /// The connection failed; a `Status(Disconnected)` follows.
    Error(String),
}

// ── Reporter ─────────────────────────────────────────────────────

/// Shared publishing state handed to the session tasks.
///
/// Each session carries the generation it was started with; once the
/// client moves on (disconnect or reconnect) a late task can no longer
/// touch status, stats or events.
#[derive(Clone)]
struct Reporter {
    generation: u64,
    current: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<ClientEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    stats: Arc<watch::Sender<DeliveryStats>>,
}

impl Reporter {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn status(&self, next: ConnectionStatus) {
        if self.is_current() {
            set_status(&self.status, &self.events, next);
        }
    }

    fn frame(&self, frame: Bytes) {
        if !self.is_current() {
            return;
        }
        let now = Instant::now();
        self.stats.send_modify(|stats| stats.record(frame.len(), now));
        let _ = self.events.send(ClientEvent::Frame(frame));
    }

    fn error(&self, error: &GlanceError) {
        if self.is_current() {
            let _ = self.events.send(ClientEvent::Error(error.to_string()));
        }
    }
}

fn set_status(
    status: &watch::Sender<ConnectionStatus>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    next: ConnectionStatus,
) {
    let changed = status.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    if changed {
        let _ = events.send(ClientEvent::Status(next));
    }
}

// ── StreamClient ─────────────────────────────────────────────────

struct Session {
    peer: SocketAddr,
    commands: mpsc::Sender<ClientLine>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// One remote viewer.
pub struct StreamClient {
    config: ClientConfig,
    generation: Arc<AtomicU64>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<ClientEvent>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    stats: Arc<watch::Sender<DeliveryStats>>,
    session: Option<Session>,
}

impl Default for StreamClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl StreamClient {
    pub fn new(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (stats, _) = watch::channel(DeliveryStats::default());
        Self {
            config,
            generation: Arc::new(AtomicU64::new(0)),
            events_tx,
            events_rx: Some(events_rx),
            status: Arc::new(status),
            stats: Arc::new(stats),
            session: None,
        }
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ClientEvent>> {
        self.events_rx.take()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats.borrow().clone()
    }

    pub fn stats_receiver(&self) -> watch::Receiver<DeliveryStats> {
        self.stats.subscribe()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(|session| session.peer)
    }

    /// Connect, then immediately send the AUTH line.
    ///
    /// Resolves once AUTH is written; the server's verdict arrives later as
    /// `Status(Authenticated)` or `Error` + `Status(Disconnected)`. An
    /// existing connection is closed first.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), GlanceError> {
        self.disconnect();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let reporter = Reporter {
            generation,
            current: Arc::clone(&self.generation),
            events: self.events_tx.clone(),
            status: Arc::clone(&self.status),
            stats: Arc::clone(&self.stats),
        };

        reporter.status(ConnectionStatus::Connecting);
        info!("connecting to {host}:{port}");

        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(fail(&reporter, e.into())),
            Err(_) => return Err(fail(&reporter, GlanceError::Timeout(timeout))),
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay: {e}");
        }
        let peer = stream.peer_addr().map_err(|e| fail(&reporter, e.into()))?;

        let codec = ViewerCodec::new().strict(self.config.strict_headers);
        let (read, write) = stream.into_split();
        let mut sink = FramedWrite::new(write, codec.clone());
        sink.send(ClientLine::Auth(self.config.secret.clone()))
            .await
            .map_err(|e| fail(&reporter, e))?;

        self.stats.send_replace(DeliveryStats::default());
        reporter.status(ConnectionStatus::Connected);

        let (commands, commands_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let writer = tokio::spawn(write_commands(sink, commands_rx));
        let reader = tokio::spawn(read_stream(
            FramedRead::new(read, codec),
            reporter,
            writer.abort_handle(),
        ));

        self.session = Some(Session {
            peer,
            commands,
            reader,
            writer,
        });
        Ok(())
    }

    /// Close the socket and clear all session state. Idempotent.
    pub fn disconnect(&mut self) {
        // Invalidate whatever the old session tasks might still report.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = self.session.take() {
            session.reader.abort();
            session.writer.abort();
            info!("disconnected from {}", session.peer);
        }
        set_status(&self.status, &self.events_tx, ConnectionStatus::Disconnected);
    }

    /// Request a capture rate. No-op unless authenticated.
    pub fn set_fps(&self, fps: i64) -> bool {
        self.send_command(ClientLine::SetFps(fps))
    }

    /// Request an encode quality. No-op unless authenticated.
    pub fn set_quality(&self, quality: i64) -> bool {
        self.send_command(ClientLine::SetQuality(quality))
    }

    /// Request a capture scale. No-op unless authenticated.
    pub fn set_scale(&self, scale: f64) -> bool {
        self.send_command(ClientLine::SetScale(scale))
    }

    fn send_command(&self, line: ClientLine) -> bool {
        if !self.is_authenticated() {
            debug!("not authenticated; dropping {line}");
            return false;
        }
        let Some(session) = &self.session else {
            return false;
        };
        match session.commands.try_send(line) {
            Ok(()) => true,
            Err(e) => {
                warn!("control command not queued: {e}");
                false
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
            session.writer.abort();
        }
    }
}

// ── Session tasks ────────────────────────────────────────────────

fn fail(reporter: &Reporter, error: GlanceError) -> GlanceError {
    warn!("connect failed: {error}");
    reporter.error(&error);
    reporter.status(ConnectionStatus::Disconnected);
    error
}

async fn read_stream(
    mut frames: FramedRead<OwnedReadHalf, ViewerCodec>,
    reporter: Reporter,
    writer: AbortHandle,
) {
    let error = loop {
        match frames.next().await {
            Some(Ok(StreamEvent::Authenticated)) => {
                info!("authenticated");
                reporter.status(ConnectionStatus::Authenticated);
            }
            Some(Ok(StreamEvent::Frame(frame))) => reporter.frame(frame),
            Some(Err(e)) => break e,
            None => {
                break GlanceError::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ));
            }
        }
    };

    warn!("stream ended: {error}");
    writer.abort();
    reporter.error(&error);
    reporter.status(ConnectionStatus::Disconnected);
}

async fn write_commands(
    mut sink: FramedWrite<OwnedWriteHalf, ViewerCodec>,
    mut commands: mpsc::Receiver<ClientLine>,
) {
    while let Some(line) = commands.recv().await {
        debug!("sending {line}");
        if let Err(e) = sink.send(line).await {
            warn!("control write failed: {e}");
            break;
        }
    }
}
