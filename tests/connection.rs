//! End-to-end connection behaviour over loopback pairs.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use portable_websocket::{
    ConnectOptions, Connection, ConnectionState, Error, Message, MessageKind, Socket,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use common::*;

// ============================================================================
// Echo Scenario
// ============================================================================

#[tokio::test]
async fn test_echo_ping_then_close() {
    let (client, server) = pair().await;
    echo(Arc::new(server));

    let mut inbox = collect_messages(&client);
    let on_close = close_signal(&client);

    client.send(MessageKind::Text, b"ping".to_vec()).expect("send");
    assert_eq!(next_message(&mut inbox).await, Message::Text("ping".into()));

    client.close().expect("close");
    closed(on_close).await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_binary_bytes_are_preserved() {
    let (client, server) = pair().await;
    let mut inbox = collect_messages(&server);

    let payload: Vec<u8> = (0..=255).collect();
    client.send_binary(payload.clone()).expect("send");

    assert_eq!(next_message(&mut inbox).await, Message::Binary(payload));
}

#[tokio::test]
async fn test_empty_messages_keep_their_kind() {
    let (client, server) = pair().await;
    let mut inbox = collect_messages(&server);

    client.send_text("").expect("send text");
    client.send_binary(Vec::new()).expect("send binary");

    assert_eq!(next_message(&mut inbox).await, Message::Text(String::new()));
    assert_eq!(next_message(&mut inbox).await, Message::Binary(Vec::new()));
}

// ============================================================================
// Backend-agnostic Contract
// ============================================================================

/// Wires handlers and sends a text and a binary frame using only [`Socket`].
fn drive<S: Socket>(
    socket: &S,
    received: mpsc::UnboundedSender<Message>,
    on_close: oneshot::Sender<()>,
) -> portable_websocket::Result<()> {
    socket.on_message(Box::new(move |message: Message| {
        let _ = received.send(message);
    }));
    socket.on_close(Box::new(move || {
        let _ = on_close.send(());
    }));

    socket.send(MessageKind::Text, b"ping".to_vec())?;
    socket.send(MessageKind::Binary, vec![0x00, 0xFF])
}

#[tokio::test]
async fn test_socket_trait_echo_then_close() {
    let listener = listener().await;
    let client = <Connection as Socket>::connect(&listener.ws_url()).expect("connect");
    let server = listener.accept_timeout(WAIT).await.expect("accept");
    echo(Arc::new(server));

    let (tx, mut inbox) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel();
    drive(&client, tx, close_tx).expect("drive");

    assert_eq!(next_message(&mut inbox).await, Message::Text("ping".into()));
    assert_eq!(
        next_message(&mut inbox).await,
        Message::Binary(vec![0x00, 0xFF])
    );

    let err = Socket::send(&client, MessageKind::Text, vec![0xC3, 0x28]).unwrap_err();
    assert!(matches!(err, Error::InvalidPayload { .. }));

    Socket::close(&client).expect("close");
    closed(close_rx).await;

    assert_eq!(Socket::state(&client), ConnectionState::Closed);
    assert!(matches!(Socket::close(&client), Err(Error::AlreadyClosed)));
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_interleaved_kinds_arrive_in_order() {
    let (client, server) = pair().await;
    let mut inbox = collect_messages(&server);

    let sent: Vec<Message> = (0..200u32)
        .map(|i| {
            if i % 3 == 0 {
                Message::Binary(i.to_be_bytes().to_vec())
            } else {
                Message::Text(format!("message-{i}"))
            }
        })
        .collect();

    for message in &sent {
        client.send_message(message.clone()).expect("send");
    }

    for expected in sent {
        assert_eq!(next_message(&mut inbox).await, expected);
    }
}

// ============================================================================
// Pre-open Sends
// ============================================================================

#[tokio::test]
async fn test_send_before_handshake_is_buffered() {
    let listener = listener().await;
    let client = Connection::connect(&listener.ws_url()).expect("connect");

    assert_eq!(client.state(), ConnectionState::Connecting);
    client.send_binary(vec![0x00, 0xFF, 0x10]).expect("queued");
    assert_eq!(client.queued_messages(), 1);

    let server = listener.accept_timeout(WAIT).await.expect("accept");
    let mut inbox = collect_messages(&server);

    assert_eq!(
        next_message(&mut inbox).await,
        Message::Binary(vec![0x00, 0xFF, 0x10])
    );
    wait_open(&client).await;
    assert_eq!(client.queued_messages(), 0);
}

#[tokio::test]
async fn test_send_queue_limit() {
    let options = ConnectOptions::new().with_max_queued_messages(2);
    let client = Connection::connect_with(&unused_address().await, options).expect("connect");

    client.send_text("one").expect("first");
    client.send_text("two").expect("second");

    let err = client.send_text("three").unwrap_err();
    assert!(matches!(err, Error::SendQueueFull { limit: 2 }));
    assert!(err.is_recoverable());
}

// ============================================================================
// Close Semantics
// ============================================================================

#[tokio::test]
async fn test_close_does_not_fire_handler_synchronously() {
    let (client, _server) = pair().await;
    wait_open(&client).await;

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    client.on_close(move || flag.store(true, Ordering::SeqCst));

    client.close().expect("close");
    assert!(!fired.load(Ordering::SeqCst));
    assert_eq!(client.state(), ConnectionState::Closing);

    // A second request while closing is accepted.
    client.close().expect("close while closing");
}

#[tokio::test]
async fn test_close_fires_exactly_once_under_concurrent_remote_close() {
    let (client, server) = pair().await;
    wait_open(&client).await;

    let client_closes = close_counter(&client);
    let server_closes = close_counter(&server);

    client.close().expect("client close");
    server.close().expect("server close");

    let deadline = tokio::time::Instant::now() + WAIT;
    while client.state() != ConnectionState::Closed || server.state() != ConnectionState::Closed {
        assert!(tokio::time::Instant::now() < deadline, "both sides should close");
        sleep(Duration::from_millis(5)).await;
    }
    sleep(Duration::from_millis(50)).await;

    assert_eq!(client_closes.load(Ordering::SeqCst), 1);
    assert_eq!(server_closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_send_after_close_is_rejected() {
    let (client, _server) = pair().await;
    let on_close = close_signal(&client);

    client.close().expect("close");
    closed(on_close).await;

    let err = client.send_text("late").unwrap_err();
    assert!(matches!(
        err,
        Error::NotOpen {
            state: ConnectionState::Closed
        }
    ));
    assert!(err.is_send_error());

    let err = client.close().unwrap_err();
    assert!(matches!(err, Error::AlreadyClosed));
    assert!(err.is_close_error());
}

#[tokio::test]
async fn test_remote_close_notifies_and_rejects_sends() {
    let (client, server) = pair().await;
    wait_open(&client).await;
    let on_close = close_signal(&client);

    server.close().expect("server close");
    closed(on_close).await;

    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.send_binary(vec![1, 2, 3]).is_err());
}

#[tokio::test]
async fn test_frames_sent_before_close_are_flushed() {
    let (client, server) = pair().await;
    let mut inbox = collect_messages(&server);
    let server_closed = close_signal(&server);
    wait_open(&client).await;

    client.send_text("first").expect("send");
    client.send_text("last").expect("send");
    client.close().expect("close");

    assert_eq!(next_message(&mut inbox).await, Message::from("first"));
    assert_eq!(next_message(&mut inbox).await, Message::from("last"));
    closed(server_closed).await;
}

#[tokio::test]
async fn test_on_close_after_closed_runs_immediately() {
    let (client, _server) = pair().await;
    let on_close = close_signal(&client);
    client.close().expect("close");
    closed(on_close).await;

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    client.on_close(move || flag.store(true, Ordering::SeqCst));
    assert!(fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_drop_closes_peer() {
    let (client, server) = pair().await;
    wait_open(&client).await;
    let server_closed = close_signal(&server);

    drop(client);
    closed(server_closed).await;
}

// ============================================================================
// Handshake Failures
// ============================================================================

#[tokio::test]
async fn test_refused_connection_fires_close() {
    let client = Connection::connect(&unused_address().await).expect("connect returns early");
    let on_close = close_signal(&client);

    closed(on_close).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(matches!(
        client.send_text("x"),
        Err(Error::NotOpen { .. })
    ));
}

#[tokio::test]
async fn test_handshake_timeout_discards_queue_and_fires_close() {
    // Accepts TCP but never answers the upgrade request.
    let silent = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = silent.local_addr().expect("addr").port();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = silent.accept().await {
            held.push(stream);
        }
    });

    let options = ConnectOptions::new().with_handshake_timeout(Duration::from_millis(100));
    let client =
        Connection::connect_with(&format!("ws://127.0.0.1:{port}"), options).expect("connect");
    let on_close = close_signal(&client);

    client.send_text("never delivered").expect("queued");
    closed(on_close).await;

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.queued_messages(), 0);
}

#[tokio::test]
async fn test_close_during_handshake_cancels() {
    let client = Connection::connect(&unused_address().await).expect("connect");
    let on_close = close_signal(&client);

    client.close().expect("close");
    closed(on_close).await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_malformed_addresses_fail_synchronously() {
    for address in ["", "localhost:80", "http://localhost", "wss://localhost"] {
        let err = Connection::connect(address).unwrap_err();
        assert!(err.is_connect_error(), "{address:?} gave {err}");
    }
}

// ============================================================================
// Payload Validation
// ============================================================================

#[tokio::test]
async fn test_invalid_utf8_text_is_rejected() {
    let (client, _server) = pair().await;

    let err = client
        .send(MessageKind::Text, vec![0xC3, 0x28])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPayload { .. }));

    client
        .send(MessageKind::Binary, vec![0xC3, 0x28])
        .expect("binary accepts any bytes");
}
