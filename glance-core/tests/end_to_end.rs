//! End-to-end tests: `StreamClient` against a live `StreamServer`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use glance_core::{
    ClientConfig, ClientEvent, ConnectionStatus, ServerConfig, StreamClient, StreamServer, from_fn,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ── Helpers ──────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

/// Each capture yields a distinct, numbered payload.
fn numbered_server() -> StreamServer {
    let counter = Arc::new(AtomicU32::new(0));
    StreamServer::new(
        ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            secret: "secret".into(),
            idle_timeout: Duration::from_secs(60),
            ..ServerConfig::default()
        },
        from_fn(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Some(Bytes::from(format!("frame-{n:04}"))) }
        }),
    )
}

fn client(secret: &str) -> (StreamClient, mpsc::UnboundedReceiver<ClientEvent>) {
    let mut client = StreamClient::new(ClientConfig {
        secret: secret.into(),
        ..ClientConfig::default()
    });
    let events = client.take_events().unwrap();
    (client, events)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timeout waiting for event")
        .expect("event channel closed")
}

async fn next_frame(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Bytes {
    loop {
        if let ClientEvent::Frame(frame) = next_event(events).await {
            return frame;
        }
    }
}

async fn connect_authenticated(
    addr: SocketAddr,
) -> (StreamClient, mpsc::UnboundedReceiver<ClientEvent>) {
    let (mut client, mut events) = client("secret");
    client.connect("127.0.0.1", addr.port()).await.unwrap();
    loop {
        if next_event(&mut events).await == ClientEvent::Status(ConnectionStatus::Authenticated) {
            break;
        }
    }
    (client, events)
}

// ── Scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_stream() {
    let mut server = numbered_server();
    let addr = server.start(0).await.unwrap();
    let (mut client, mut events) = client("secret");

    assert!(!client.set_fps(4), "commands are no-ops before connect");
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Connecting)
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Connected)
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Authenticated)
    );

    // Priming frame.
    let first = next_frame(&mut events).await;
    assert_eq!(&first[..], b"frame-0000");
    assert_eq!(client.stats().frames_received, 1);
    assert_eq!(client.stats().bytes_received, 10);

    assert!(client.set_fps(4));
    let mut server_status = server.status_receiver();
    tokio::time::timeout(
        WAIT,
        server_status.wait_for(|s| s.settings.interval() == Duration::from_millis(250)),
    )
    .await
    .unwrap()
    .unwrap();

    next_frame(&mut events).await;
    let mut last = Instant::now();
    for _ in 0..4 {
        next_frame(&mut events).await;
        let now = Instant::now();
        // 250 ms cadence, with slack for scheduling jitter.
        assert!(now - last >= Duration::from_millis(200), "{:?}", now - last);
        last = now;
    }
    assert!(client.stats().frames_received >= 6);
    assert!(client.stats().fps > 0.0);

    client.disconnect();
    server.stop().await;
}

#[tokio::test]
async fn test_wrong_secret_reports_error_and_disconnects() {
    let mut server = numbered_server();
    let addr = server.start(0).await.unwrap();
    let (mut client, mut events) = client("guess");

    client.connect("127.0.0.1", addr.port()).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Connecting)
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Connected)
    );
    match next_event(&mut events).await {
        ClientEvent::Error(message) => assert!(message.contains("FAIL"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Disconnected)
    );
    assert!(!client.set_quality(50));
    assert_eq!(server.status().clients, 0);
    server.stop().await;
}

#[tokio::test]
async fn test_connect_refused() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let (mut client, mut events) = client("secret");

    assert!(client.connect("127.0.0.1", port).await.is_err());
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Connecting)
    );
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Disconnected)
    );
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let mut server = numbered_server();
    let addr = server.start(0).await.unwrap();
    let (mut client, mut events) = connect_authenticated(addr).await;

    client.disconnect();
    client.disconnect();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.set_scale(0.5));

    let mut disconnects = 0;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(300), events.recv()).await
    {
        if event == ClientEvent::Status(ConnectionStatus::Disconnected) {
            disconnects += 1;
        }
    }
    assert_eq!(disconnects, 1);

    let mut status = server.status_receiver();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.clients == 0))
        .await
        .unwrap()
        .unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_server_stop_disconnects_viewer() {
    let mut server = numbered_server();
    let addr = server.start(0).await.unwrap();
    let (client, mut events) = connect_authenticated(addr).await;

    server.stop().await;
    loop {
        match next_event(&mut events).await {
            ClientEvent::Status(ConnectionStatus::Disconnected) => break,
            ClientEvent::Frame(_) | ClientEvent::Error(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_fan_out_survives_one_viewer_leaving() {
    let mut server = numbered_server();
    let addr = server.start(0).await.unwrap();

    let (_a, mut a_events) = connect_authenticated(addr).await;
    let (mut b, _b_events) = connect_authenticated(addr).await;
    let (_c, mut c_events) = connect_authenticated(addr).await;

    let mut status = server.status_receiver();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.clients == 3))
        .await
        .unwrap()
        .unwrap();

    b.disconnect();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.clients == 2))
        .await
        .unwrap()
        .unwrap();

    // Both remaining viewers keep receiving the same ticks.
    for _ in 0..3 {
        let from_a = next_frame(&mut a_events).await;
        let from_c = next_frame(&mut c_events).await;
        assert!(from_a.starts_with(b"frame-"));
        assert!(from_c.starts_with(b"frame-"));
    }
    assert!(server.status().capturing);
    server.stop().await;
}

#[tokio::test]
async fn test_absurd_frame_size_disconnects_cleanly() {
    // A hand-rolled server that authenticates, then announces a frame no
    // viewer could ever buffer, and keeps the socket open afterwards.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut auth = String::new();
        BufReader::new(read).read_line(&mut auth).await.unwrap();
        assert_eq!(auth, "AUTH secret\n");
        write
            .write_all(b"OK\nFRAME 18446744073709551615\nabc")
            .await
            .unwrap();
        tokio::time::sleep(WAIT).await;
        drop(write);
    });

    let (mut client, mut events) = client("secret");
    client.connect("127.0.0.1", port).await.unwrap();
    for expected in [
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::Authenticated,
    ] {
        assert_eq!(next_event(&mut events).await, ClientEvent::Status(expected));
    }
    match next_event(&mut events).await {
        ClientEvent::Error(message) => assert!(message.contains("too large"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Status(ConnectionStatus::Disconnected)
    );
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.stats().frames_received, 0);
    server.abort();
}
