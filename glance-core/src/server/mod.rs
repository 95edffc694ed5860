//! Stream server: accepts viewers, authenticates them, and pushes a
//! captured frame to all of them on every tick.
//!
//! ```text
//!              ┌──────────────── ServerLoop (one task) ────────────────┐
//! TcpListener ─┤ accept → reader task per socket → ConnEvent::Line     │
//!              │ tick ──► CaptureGate ──► FrameSource (own task)       │
//!              │                              │                        │
//!              │            FRAME <n>\n<n bytes> ──► ClientSet (fan-out)│
//!              │ idle Sleep ──► stop + IdleStopped                     │
//!              └───────────────────────────────────────────────────────┘
//! ```
//!
//! The capture timer only exists while at least one viewer is
//! authenticated; the idle timer only while none is.

pub mod gate;
pub mod registry;

mod actor;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::GlanceError;
use crate::protocol::settings::{DEFAULT_FPS, DEFAULT_QUALITY, DEFAULT_SCALE};
use crate::protocol::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SECRET, StreamSettings};
use crate::source::FrameSource;

use actor::ServerLoop;

pub use gate::CaptureGate;
pub use registry::{ClientId, ClientSet};

// ── ServerConfig ─────────────────────────────────────────────────

/// Explicit construction parameters for a [`StreamServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// Shared secret expected in the AUTH line.
    pub secret: String,
    /// How long the server may sit with no viewers before stopping.
    pub idle_timeout: Duration,
    /// Initial frame rate (clamped 1–4).
    pub fps: i64,
    /// Initial quality hint (clamped 10–90).
    pub quality: i64,
    /// Initial scale hint (clamped 0.25–1.0).
    pub scale: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            secret: DEFAULT_SECRET.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            fps: DEFAULT_FPS,
            quality: DEFAULT_QUALITY as i64,
            scale: DEFAULT_SCALE,
        }
    }
}

impl ServerConfig {
    pub fn initial_settings(&self) -> StreamSettings {
        StreamSettings::new(self.fps, self.quality, self.scale)
    }
}

// ── Events & status ──────────────────────────────────────────────

/// Notifications for the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Listening on the given address.
    Started(SocketAddr),
    /// The authenticated viewer count changed.
    ClientsChanged(usize),
    /// The idle window elapsed with no viewers; the server stopped itself.
    IdleStopped,
    /// The server shut down (requested or idle).
    Stopped,
}

/// Point-in-time view of the server, published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStatus {
    pub running: bool,
    pub local_addr: Option<SocketAddr>,
    /// Authenticated viewers.
    pub clients: usize,
    /// Connections still waiting for their AUTH line.
    pub pending: usize,
    /// Whether the capture timer is armed.
    pub capturing: bool,
    pub skipped_frames: u64,
    pub frames_sent: u64,
    pub settings: StreamSettings,
}

// ── StreamServer ─────────────────────────────────────────────────

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Handle to a stream server owned by its embedder.
///
/// Dropping the handle stops a running server.
pub struct StreamServer {
    config: ServerConfig,
    source: Arc<dyn FrameSource>,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    status: Arc<watch::Sender<ServerStatus>>,
    running: Option<Running>,
}

impl StreamServer {
    pub fn new(config: ServerConfig, source: impl FrameSource) -> Self {
        Self::with_source(config, Arc::new(source))
    }

    pub fn with_source(config: ServerConfig, source: Arc<dyn FrameSource>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ServerStatus::default());
        Self {
            config,
            source,
            events_tx,
            events_rx: Some(events_rx),
            status: Arc::new(status),
            running: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ServerEvent>> {
        self.events_rx.take()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Whether the server loop is alive (false after an idle stop).
    pub fn is_running(&self) -> bool {
        self.local_addr().is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        // The loop resets the status before it exits, so a finished loop is
        // visible here even while its task is still winding down.
        let live = self.status.borrow().running;
        self.running
            .as_ref()
            .filter(|running| live && !running.task.is_finished())
            .map(|running| running.addr)
    }

    /// Bind `port` and start accepting viewers.
    ///
    /// Calling this while running is a no-op returning the bound address.
    /// A bind failure leaves the server stopped.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr, GlanceError> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        // Left over from an idle stop.
        if let Some(stale) = self.running.take() {
            let _ = stale.task.await;
        }

        let addr = SocketAddr::new(self.config.bind_addr, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GlanceError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server_loop = ServerLoop::new(
            listener,
            local_addr,
            &self.config,
            Arc::clone(&self.source),
            self.events_tx.clone(),
            Arc::clone(&self.status),
        );
        let _ = self.events_tx.send(ServerEvent::Started(local_addr));
        info!(
            "stream server listening on {local_addr} (idle timeout {:?})",
            self.config.idle_timeout
        );
        let task = tokio::spawn(server_loop.run(shutdown_rx));

        self.running = Some(Running {
            addr: local_addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Stop the server: timers cancelled, every socket closed, counters
    /// reset. Safe to call repeatedly or when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        let _ = running.task.await;
    }
}
