//! Shared helpers for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use portable_websocket::{ConnectOptions, Connection, ConnectionState, Listener, Message};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Connection Helpers
// ============================================================================

/// Binds a loopback listener on a random port.
pub async fn listener() -> Listener {
    Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
        .await
        .expect("bind should succeed")
}

/// Returns a loopback URL nothing is listening on.
pub async fn unused_address() -> String {
    let listener = listener().await;
    let url = listener.ws_url();
    drop(listener);
    url
}

/// Connects a client to a fresh listener and accepts it.
///
/// Returns `(client, server)`. The server side is open; the client may still
/// be finishing its handshake.
pub async fn pair() -> (Connection, Connection) {
    pair_with(ConnectOptions::default()).await
}

/// Like [`pair`] with explicit client options.
pub async fn pair_with(options: ConnectOptions) -> (Connection, Connection) {
    let listener = listener().await;
    let client = Connection::connect_with(&listener.ws_url(), options).expect("connect");
    let server = listener.accept_timeout(WAIT).await.expect("accept");
    (client, server)
}

/// Waits until the connection leaves `Connecting`.
pub async fn wait_open(connection: &Connection) {
    timeout(WAIT, async {
        while connection.state() == ConnectionState::Connecting {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection should open");
    assert_eq!(connection.state(), ConnectionState::Open);
}

// ============================================================================
// Handler Helpers
// ============================================================================

/// Routes inbound messages into a channel.
pub fn collect_messages(connection: &Connection) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    connection.on_message(move |message| {
        let _ = tx.send(message);
    });
    rx
}

/// Resolves when the close handler fires.
pub fn close_signal(connection: &Connection) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    connection.on_close(move || {
        let _ = tx.send(());
    });
    rx
}

/// Counts close handler invocations.
pub fn close_counter(connection: &Connection) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    connection.on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    count
}

/// Receives the next message or panics after [`WAIT`].
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    timeout(WAIT, rx.recv())
        .await
        .expect("message should arrive")
        .expect("channel open")
}

/// Waits for a close signal or panics after [`WAIT`].
pub async fn closed(signal: oneshot::Receiver<()>) {
    timeout(WAIT, signal)
        .await
        .expect("close handler should fire")
        .expect("close handler dropped without firing");
}

/// Makes `connection` echo every message back to its peer.
pub fn echo(connection: Arc<Connection>) {
    let sender = Arc::clone(&connection);
    connection.on_message(move |message| {
        let _ = sender.send_message(message);
    });
}
