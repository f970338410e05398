//! End-to-end tests: real WebSocket clients against a running server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use playpool::WsDirectory;
use playpool::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Running {
    addr: String,
    directory: Arc<WsDirectory>,
    stop: tokio::sync::oneshot::Sender<()>,
    task: tokio::task::JoinHandle<Result<(), PlaypoolError>>,
}

/// Starts a server on a random port.
async fn start_server(capacity: usize) -> Running {
    start_with(RoomConfig {
        capacity,
        ..RoomConfig::default()
    })
    .await
}

async fn start_with(rooms: RoomConfig) -> Running {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".into(),
        rooms,
        ..ServerConfig::default()
    };
    let server = PlaypoolServer::builder()
        .config(config)
        .build()
        .await
        .expect("server should build");
    assert_eq!(server.config().ws_path, "/ws");
    let directory = server.directory();

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    Running {
        addr,
        directory,
        stop,
        task,
    }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("should connect");
    ws
}

async fn notify(ws: &mut ClientWs, kind: &str) {
    let frame = format!(r#"{{"kind":"{kind}"}}"#);
    ws.send(Message::text(frame)).await.expect("send");
}

/// Next envelope the server pushed, skipping control frames.
async fn next_envelope(ws: &mut ClientWs) -> serde_json::Value {
    let wait = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("envelope json");
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return serde_json::from_slice(&bytes).expect("envelope json");
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("envelope within timeout")
}

async fn expect_nothing(ws: &mut ClientWs) {
    let got = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(got.is_err(), "expected no frame, got {got:?}");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_second_client_is_announced_to_first() {
    let server = start_server(10).await;
    let mut a = connect(&server.addr).await;
    // Make sure `a` is seated before `b` arrives.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = connect(&server.addr).await;

    let notice = next_envelope(&mut a).await;
    assert_eq!(notice["kind"], "Connected");
    assert_eq!(notice["playerId"], 1);
    expect_nothing(&mut b).await;
}

#[tokio::test]
async fn test_attack_is_relayed_to_others() {
    let server = start_server(10).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(connect(&server.addr).await);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    // Drain join notices: first client saw two, second saw one.
    next_envelope(&mut clients[0]).await;
    next_envelope(&mut clients[0]).await;
    next_envelope(&mut clients[1]).await;

    notify(&mut clients[1], "Attack").await;

    for i in [0, 2] {
        let attack = next_envelope(&mut clients[i]).await;
        assert_eq!(attack["kind"], "Attack");
        assert_eq!(attack["playerId"], 1);
    }
    expect_nothing(&mut clients[1]).await;
}

#[tokio::test]
async fn test_score_update_is_not_relayed() {
    let server = start_server(10).await;
    let mut a = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = connect(&server.addr).await;
    next_envelope(&mut a).await;

    notify(&mut b, "ScoreUpdate").await;
    expect_nothing(&mut a).await;
    expect_nothing(&mut b).await;
}

#[tokio::test]
async fn test_disconnect_is_broadcast() {
    let server = start_server(10).await;
    let mut a = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = connect(&server.addr).await;
    next_envelope(&mut a).await;

    b.close(None).await.expect("close");

    let left = next_envelope(&mut a).await;
    assert_eq!(left["kind"], "Disconnected");
    assert_eq!(left["playerId"], 1);
}

#[tokio::test]
async fn test_full_room_overflows_into_new_room() {
    let server = start_server(1).await;
    let mut a = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Separate rooms: neither hears about the other.
    notify(&mut a, "Attack").await;
    expect_nothing(&mut b).await;
    expect_nothing(&mut a).await;
}

#[tokio::test]
async fn test_upgrade_refused_on_other_paths() {
    let server = start_server(10).await;
    let result =
        tokio_tungstenite::connect_async(format!("ws://{}/elsewhere", server.addr)).await;
    assert!(result.is_err(), "only the ws path upgrades");

    // The accept loop survives a refused handshake.
    let mut a = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _b = connect(&server.addr).await;
    assert_eq!(next_envelope(&mut a).await["kind"], "Connected");
}

#[tokio::test]
async fn test_shutdown_signal_closes_clients() {
    let server = start_server(10).await;
    let mut a = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.stop.send(()).expect("server still running");
    let result = tokio::time::timeout(Duration::from_secs(2), server.task)
        .await
        .expect("server stops")
        .expect("task");
    assert!(result.is_ok());

    let end = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(end.is_ok(), "client should see the connection close");
}

#[tokio::test]
async fn test_idle_tcp_client_does_not_block_others() {
    let server = start_server(10).await;
    // Opens a socket and never sends the upgrade request.
    let _idle = tokio::net::TcpStream::connect(&server.addr)
        .await
        .expect("tcp connect");

    let connected = tokio::time::timeout(
        Duration::from_secs(3),
        tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr)),
    )
    .await;
    assert!(
        matches!(connected, Ok(Ok(_))),
        "upgrade should not wait on the idle socket"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_that_stops_reading_is_dropped_and_room_keeps_working() {
    let server = start_with(RoomConfig {
        capacity: 10,
        send_timeout_ms: 200,
        ..RoomConfig::default()
    })
    .await;

    // Member 0: a tiny receive window and nobody reading it.
    let socket = tokio::net::TcpSocket::new_v4().expect("socket");
    socket.set_recv_buffer_size(2048).expect("recv buffer");
    let stream = socket
        .connect(server.addr.parse().expect("addr"))
        .await
        .expect("tcp connect");
    let (_stalled, _) =
        tokio_tungstenite::client_async(format!("ws://{}/ws", server.addr), stream)
            .await
            .expect("stalled client upgrades");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut attacker = connect(&server.addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut watcher = connect(&server.addr).await;
    assert_eq!(next_envelope(&mut attacker).await["playerId"], 2);

    // The watcher drains everything until it hears member 0 leave.
    let watching = tokio::spawn(async move {
        loop {
            let envelope = match watcher.next().await {
                Some(Ok(Message::Text(text))) => {
                    serde_json::from_str::<serde_json::Value>(text.as_str())
                        .expect("envelope json")
                }
                Some(Ok(_)) => continue,
                other => panic!("watcher lost its connection: {other:?}"),
            };
            if envelope["kind"] == "Disconnected" && envelope["playerId"] == 0 {
                return watcher;
            }
        }
    });

    let deadline = Instant::now() + Duration::from_secs(30);
    while !watching.is_finished() {
        assert!(
            Instant::now() < deadline,
            "the stalled client was never dropped"
        );
        for _ in 0..500 {
            attacker
                .feed(Message::text(r#"{"kind":"Attack"}"#.to_string()))
                .await
                .expect("feed");
        }
        attacker.flush().await.expect("flush");
    }
    let _watcher = watching.await.expect("watcher task");

    // The room still answers and only the two readers remain.
    let room = server
        .directory
        .rooms()
        .await
        .into_iter()
        .next()
        .expect("one room");
    let info = tokio::time::timeout(Duration::from_secs(2), room.info())
        .await
        .expect("room answers promptly")
        .expect("room alive");
    assert_eq!(info.members, 2);
}
