//! Echo server.
//!
//! Accepts WebSocket peers and sends every message straight back.
//!
//! Usage: cargo run --example echo_server -- [port] [--debug]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use portable_websocket::Listener;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    init_logging(args.iter().any(|a| a == "--debug"));

    let port = args
        .iter()
        .find_map(|a| a.parse::<u16>().ok())
        .unwrap_or(9001);

    let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), port).await?;
    println!("Echo server listening on {}", listener.ws_url());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let connection = Arc::new(accepted?);
                let id = connection.id();
                info!(%id, "Peer connected");

                let sender = Arc::clone(&connection);
                connection.on_message(move |message| {
                    let _ = sender.send_message(message);
                });
                connection.on_close(move || info!(%id, "Peer disconnected"));
            }

            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "portable_websocket=debug,echo_server=debug"
    } else {
        "portable_websocket=info,echo_server=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
