//! Native WebSocket listener.
//!
//! Accepts inbound peers and hands each one out as a [`Connection`] that is
//! already `Open`. Accepted connections follow the same contract as client
//! connections, which makes a listener plus a client a connected pair.
//!
//! # Connection Flow
//!
//! 1. `Listener::bind` - Bind to an address (port 0 for a random port)
//! 2. Peer connects to `Listener::ws_url`
//! 3. `Listener::accept` - Accept TCP and complete the server handshake
//! 4. Register handlers on the returned connection

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::options::ConnectOptions;

use super::Connection;

// ============================================================================
// Listener
// ============================================================================

/// A bound WebSocket listener.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use portable_websocket::Listener;
///
/// let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("listening on {}", listener.ws_url());
///
/// let connection = listener.accept().await?;
/// connection.on_message(|message| println!("{message:?}"));
/// ```
pub struct Listener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Bound address.
    local_addr: SocketAddr,
    /// Options applied to accepted connections.
    options: ConnectOptions,
}

impl Listener {
    /// Binds a listener to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        Self::bind_with(ip, port, ConnectOptions::default()).await
    }

    /// Binds a listener whose accepted connections use `options`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Io`] if binding fails
    pub async fn bind_with(ip: IpAddr, port: u16, options: ConnectOptions) -> Result<Self> {
        options.validate()?;

        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "WebSocket listener bound");

        Ok(Self {
            listener,
            local_addr,
            options,
        })
    }

    /// Returns the port the listener is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this listener.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Accepts one peer and completes the server-side handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if accepting the TCP connection fails
    /// - [`Error::Connect`] if the WebSocket upgrade fails
    pub async fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.listener.accept().await?;

        debug!(%peer, "TCP connection accepted");

        if self.options.nodelay {
            stream.set_nodelay(true)?;
        }

        let ws_stream = tokio_tungstenite::accept_async_with_config(
            stream,
            Some(Connection::ws_config(&self.options)),
        )
        .await
        .map_err(|e| Error::connect(format!("WebSocket upgrade failed: {e}")))?;

        info!(%peer, port = self.port(), "WebSocket connection established");

        Ok(Connection::accepted(ws_stream, peer, &self.options))
    }

    /// Accepts one peer, giving up after `wait`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if no peer completes within `wait`
    /// - Any error from [`Listener::accept`]
    pub async fn accept_timeout(&self, wait: Duration) -> Result<Connection> {
        timeout(wait, self.accept())
            .await
            .map_err(|_| Error::connection_timeout(wait))?
    }
}

// ============================================================================
// Tests
// ============================================================================
