//! The server event loop.
//!
//! One task owns every piece of mutable server state and reacts to a
//! single `select!`: accepted sockets, lines from per-connection readers,
//! finished captures, capture ticks, the idle deadline and the stop
//! signal. Nothing else touches the client set, the capture gate or the
//! tunables, so no locking is needed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::auth::AuthSecret;
use crate::codec::ControlCodec;
use crate::error::GlanceError;
use crate::protocol::{ClientLine, MAX_FRAME_SIZE, ServerMessage, StreamSettings};
use crate::server::gate::CaptureGate;
use crate::server::registry::{ClientId, ClientSet};
use crate::server::{ServerConfig, ServerEvent, ServerStatus};
use crate::source::FrameSource;
use crate::state::SessionPhase;

// ── Internal events ──────────────────────────────────────────────

/// Sent by per-connection reader tasks.
#[derive(Debug)]
enum ConnEvent {
    Line(ClientId, ClientLine),
    Closed(ClientId, Option<GlanceError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Requested,
    Idle,
}

struct Session {
    phase: SessionPhase,
    peer: SocketAddr,
    reader: AbortHandle,
}

// ── ServerLoop ───────────────────────────────────────────────────

pub(crate) struct ServerLoop {
    listener: TcpListener,
    local_addr: SocketAddr,
    secret: AuthSecret,
    source: Arc<dyn FrameSource>,
    idle_timeout: Duration,

    settings: StreamSettings,
    gate: CaptureGate,
    capture: Option<AbortHandle>,
    frames_sent: u64,

    next_id: ClientId,
    sessions: HashMap<ClientId, Session>,
    /// Write halves of connections still in `Unauthenticated`.
    pending: HashMap<ClientId, OwnedWriteHalf>,
    clients: ClientSet<OwnedWriteHalf>,

    ticker: Option<Interval>,
    idle: Option<Pin<Box<Sleep>>>,

    conn_tx: mpsc::UnboundedSender<ConnEvent>,
    conn_rx: mpsc::UnboundedReceiver<ConnEvent>,
    capture_tx: mpsc::UnboundedSender<Option<Bytes>>,
    capture_rx: mpsc::UnboundedReceiver<Option<Bytes>>,

    events: mpsc::UnboundedSender<ServerEvent>,
    status: Arc<watch::Sender<ServerStatus>>,
}

impl ServerLoop {
    /// Build the loop around a bound listener.
    ///
    /// The idle timer is armed and the status published immediately so
    /// the embedder observes a running server as soon as `start` returns.
    pub(crate) fn new(
        listener: TcpListener,
        local_addr: SocketAddr,
        config: &ServerConfig,
        source: Arc<dyn FrameSource>,
        events: mpsc::UnboundedSender<ServerEvent>,
        status: Arc<watch::Sender<ServerStatus>>,
    ) -> Self {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let mut server = Self {
            listener,
            local_addr,
            secret: AuthSecret::new(&config.secret),
            source,
            idle_timeout: config.idle_timeout,
            settings: config.initial_settings(),
            gate: CaptureGate::new(),
            capture: None,
            frames_sent: 0,
            next_id: 1,
            sessions: HashMap::new(),
            pending: HashMap::new(),
            clients: ClientSet::new(),
            ticker: None,
            idle: None,
            conn_tx,
            conn_rx,
            capture_tx,
            capture_rx,
            events,
            status,
        };
        server.arm_idle();
        server.publish();
        server
    }

    /// Run until stopped, the handle is dropped, or the idle window expires.
    pub(crate) async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => break StopReason::Requested,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept(stream, peer),
                    Err(e) => warn!("accept error: {e}"),
                },
                Some(event) = self.conn_rx.recv() => self.on_connection_event(event).await,
                Some(frame) = self.capture_rx.recv() => self.finish_capture(frame).await,
                _ = next_tick(&mut self.ticker) => self.begin_capture(),
                _ = idle_expired(&mut self.idle) => {
                    if self.clients.is_empty() {
                        break StopReason::Idle;
                    }
                    self.idle = None;
                }
            }
        };

        self.shutdown().await;
        let events = self.events.clone();
        let idle_timeout = self.idle_timeout;
        // The listener must be closed before anyone hears about the stop.
        drop(self);

        if reason == StopReason::Idle {
            info!("no viewers for {idle_timeout:?}; stream server stopped");
            let _ = events.send(ServerEvent::IdleStopped);
        } else {
            info!("stream server stopped");
        }
        let _ = events.send(ServerEvent::Stopped);
    }

    // ── Connections ──────────────────────────────────────────────

    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay for {peer}: {e}");
        }
        let (read, write) = stream.into_split();
        let reader = tokio::spawn(read_lines(id, read, self.conn_tx.clone()));

        self.sessions.insert(
            id,
            Session {
                phase: SessionPhase::default(),
                peer,
                reader: reader.abort_handle(),
            },
        );
        self.pending.insert(id, write);
        debug!("connection {id} accepted from {peer}");
        self.publish();
    }

    async fn on_connection_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Line(id, line) => self.on_line(id, line).await,
            // Garbage before AUTH still earns a FAIL.
            ConnEvent::Closed(id, Some(e @ GlanceError::LineTooLong { .. }))
                if self.pending.contains_key(&id) =>
            {
                warn!("connection {id}: {e} before AUTH");
                self.reject(id).await;
            }
            ConnEvent::Closed(id, error) => {
                match error {
                    Some(e) => debug!("connection {id} failed: {e}"),
                    None => debug!("connection {id} closed by peer"),
                }
                self.drop_connection(id);
            }
        }
    }

    async fn on_line(&mut self, id: ClientId, line: ClientLine) {
        // Lines can still be in flight for a connection we already closed.
        let Some(session) = self.sessions.get(&id) else {
            return;
        };

        if session.phase.is_authenticated() {
            self.apply_command(id, line);
            return;
        }

        let peer = session.peer;
        match line {
            ClientLine::Auth(password) if self.secret.verify(&password) => {
                self.authenticate(id).await;
            }
            ClientLine::Auth(_) => {
                warn!("connection {id} from {peer}: wrong password");
                self.reject(id).await;
            }
            other => {
                warn!("connection {id} from {peer}: expected AUTH, got {other:?}");
                self.reject(id).await;
            }
        }
    }

    async fn authenticate(&mut self, id: ClientId) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if let Err(e) = session.phase.authenticate() {
            warn!("connection {id}: {e}");
            return;
        }
        let peer = session.peer;
        let Some(writer) = self.pending.remove(&id) else {
            return;
        };

        self.clients.insert(id, writer);
        self.idle = None;

        let ok = ControlCodec::envelope(ServerMessage::Ok);
        if let Err(e) = self.clients.send_to(id, &ok).await {
            warn!("client {id} ({peer}) dropped before OK: {e}");
            self.drop_connection(id);
            return;
        }

        info!(
            "client {id} ({peer}) authenticated; {} viewer(s)",
            self.clients.len()
        );
        self.emit(ServerEvent::ClientsChanged(self.clients.len()));

        if self.ticker.is_none() {
            self.start_ticker();
            // Priming frame for the first viewer.
            self.begin_capture();
        }
        self.publish();
    }

    async fn reject(&mut self, id: ClientId) {
        if let Some(mut writer) = self.pending.remove(&id) {
            let fail = ControlCodec::envelope(ServerMessage::Fail);
            if let Err(e) = writer.write_all(&fail).await {
                debug!("connection {id}: FAIL not delivered: {e}");
            }
            let _ = writer.shutdown().await;
        }
        self.close_session(id);
        self.publish();
    }

    fn apply_command(&mut self, id: ClientId, line: ClientLine) {
        match line {
            ClientLine::SetFps(fps) => {
                if self.settings.set_fps(fps) && self.ticker.is_some() {
                    self.start_ticker();
                }
                info!(
                    "client {id}: SET_FPS {fps} -> interval {:?}",
                    self.settings.interval()
                );
            }
            ClientLine::SetQuality(quality) => {
                self.settings.set_quality(quality);
                info!("client {id}: quality {}", self.settings.quality());
            }
            ClientLine::SetScale(scale) => {
                self.settings.set_scale(scale);
                info!("client {id}: scale {}", self.settings.scale());
            }
            ClientLine::Auth(_) => debug!("client {id}: ignoring repeated AUTH"),
            ClientLine::Unknown(line) => debug!("client {id}: ignoring {line:?}"),
        }
        self.publish();
    }

    /// Removal path shared by EOF, read errors and failed writes.
    fn drop_connection(&mut self, id: ClientId) {
        self.pending.remove(&id);
        let was_client = self.clients.remove(id).is_some();
        if self.close_session(id).is_none() {
            return;
        }
        if was_client {
            self.client_left();
        }
        self.publish();
    }

    fn close_session(&mut self, id: ClientId) -> Option<Session> {
        let mut session = self.sessions.remove(&id)?;
        session.phase.close();
        session.reader.abort();
        debug!("connection {id} ({}) closed", session.peer);
        Some(session)
    }

    fn client_left(&mut self) {
        let remaining = self.clients.len();
        info!("viewer left; {remaining} remaining");
        self.emit(ServerEvent::ClientsChanged(remaining));
        if remaining == 0 {
            self.ticker = None;
            self.arm_idle();
        }
    }

    // ── Capture / broadcast ──────────────────────────────────────

    fn begin_capture(&mut self) {
        if !self.gate.try_begin() {
            if self.gate.should_warn() {
                warn!(
                    "capture still running; {} consecutive ticks skipped ({} total)",
                    self.gate.consecutive_skips(),
                    self.gate.skipped()
                );
            }
            self.publish();
            return;
        }

        let source = Arc::clone(&self.source);
        let settings = self.settings.capture_settings();
        let done = self.capture_tx.clone();
        let task = tokio::spawn(async move {
            let frame = AssertUnwindSafe(source.capture(settings))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!("frame source panicked");
                    None
                });
            let _ = done.send(frame);
        });
        self.capture = Some(task.abort_handle());
    }

    async fn finish_capture(&mut self, frame: Option<Bytes>) {
        self.gate.finish();
        self.capture = None;

        let Some(frame) = frame.filter(|f| !f.is_empty()) else {
            debug!("frame source returned nothing; tick abandoned");
            return;
        };
        if frame.len() > MAX_FRAME_SIZE {
            warn!(
                "frame of {} bytes exceeds the {MAX_FRAME_SIZE}-byte limit; tick abandoned",
                frame.len()
            );
            return;
        }
        if self.clients.is_empty() {
            return;
        }

        let size = frame.len();
        let envelope = ControlCodec::envelope(ServerMessage::Frame(frame));
        let failed = self.clients.broadcast(&envelope).await;
        self.frames_sent += 1;
        debug!(
            "frame of {size} bytes sent to {} viewer(s)",
            self.clients.len()
        );

        if !failed.is_empty() {
            for (id, e) in &failed {
                warn!("dropping client {id}: write failed: {e}");
                self.close_session(*id);
            }
            self.client_left();
        }
        self.publish();
    }

    fn start_ticker(&mut self) {
        let period = self.settings.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn arm_idle(&mut self) {
        self.idle = Some(Box::pin(tokio::time::sleep(self.idle_timeout)));
    }

    // ── Teardown & reporting ─────────────────────────────────────

    async fn shutdown(&mut self) {
        self.ticker = None;
        self.idle = None;
        if let Some(capture) = self.capture.take() {
            capture.abort();
        }
        for (_, mut writer) in self.clients.drain() {
            let _ = writer.shutdown().await;
        }
        for (_, mut writer) in self.pending.drain() {
            let _ = writer.shutdown().await;
        }
        for (_, mut session) in self.sessions.drain() {
            session.phase.close();
            session.reader.abort();
        }
        self.gate.reset();
        self.frames_sent = 0;
        self.status.send_replace(ServerStatus::default());
    }

    fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.status.send_replace(ServerStatus {
            running: true,
            local_addr: Some(self.local_addr),
            clients: self.clients.len(),
            pending: self.pending.len(),
            capturing: self.ticker.is_some(),
            skipped_frames: self.gate.skipped(),
            frames_sent: self.frames_sent,
            settings: self.settings,
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Forward decoded lines from one socket to the server loop.
async fn read_lines(id: ClientId, read: OwnedReadHalf, tx: mpsc::UnboundedSender<ConnEvent>) {
    let mut lines = FramedRead::new(read, ControlCodec::new());
    loop {
        let event = match lines.next().await {
            Some(Ok(line)) => ConnEvent::Line(id, line),
            Some(Err(e)) => ConnEvent::Closed(id, Some(e)),
            None => ConnEvent::Closed(id, None),
        };
        let closed = matches!(event, ConnEvent::Closed(..));
        if tx.send(event).is_err() || closed {
            return;
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle_expired(idle: &mut Option<Pin<Box<Sleep>>>) {
    match idle {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
