//! Echo client.
//!
//! Connects, sends a text and a binary message, prints the replies, then
//! closes and waits for the close notification.
//!
//! Usage: cargo run --example echo_client -- [ws://127.0.0.1:9001] [--debug]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use portable_websocket::{Connection, Message, MessageKind};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_ADDRESS: &str = "ws://127.0.0.1:9001";

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    init_logging(args.iter().any(|a| a == "--debug"));

    let address = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map_or(DEFAULT_ADDRESS, String::as_str);

    let connection = Connection::connect(address)?;
    println!("[Connect] {address} ({})", connection.id());

    let (message_tx, mut message_rx) = mpsc::unbounded_channel::<Message>();
    connection.on_message(move |message| {
        let _ = message_tx.send(message);
    });

    let (close_tx, close_rx) = oneshot::channel();
    connection.on_close(move || {
        let _ = close_tx.send(());
    });

    // Queued until the handshake completes.
    connection.send(MessageKind::Text, b"ping".to_vec())?;
    connection.send_binary(vec![0x00, 0xFF, 0x10])?;

    for _ in 0..2 {
        match timeout(REPLY_TIMEOUT, message_rx.recv()).await {
            Ok(Some(Message::Text(text))) => println!("[Reply] text: {text}"),
            Ok(Some(Message::Binary(bytes))) => println!("[Reply] binary: {bytes:02x?}"),
            Ok(None) => break,
            Err(_) => anyhow::bail!("no reply within {REPLY_TIMEOUT:?}"),
        }
    }

    connection.close()?;
    timeout(REPLY_TIMEOUT, close_rx).await??;
    println!("[Close] state: {}", connection.state());

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "portable_websocket=debug"
    } else {
        "portable_websocket=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
