//! Connection options and configuration.
//!
//! Provides a type-safe interface for tuning how a connection performs its
//! handshake, buffers outbound frames, and shuts down.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use portable_websocket::ConnectOptions;
//!
//! let options = ConnectOptions::new()
//!     .with_handshake_timeout(Duration::from_secs(5))
//!     .with_max_queued_messages(256)
//!     .with_protocol("chat.v1");
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default opening handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for the peer's close reply.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default limit on frames waiting for the transport.
pub const DEFAULT_MAX_QUEUED_MESSAGES: usize = 1024;

/// Default inbound message size cap (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

// ============================================================================
// ConnectOptions
// ============================================================================

/// Connection configuration options.
///
/// Timeouts and size limits apply to the native backend. The browser owns
/// those policies for its own sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Abort the opening handshake after this long.
    pub handshake_timeout: Duration,

    /// Wait this long for the peer to answer a close frame.
    pub close_timeout: Duration,

    /// Maximum number of outbound frames waiting for the transport.
    pub max_queued_messages: usize,

    /// Largest inbound message accepted, `None` for no limit.
    pub max_message_size: Option<usize>,

    /// Subprotocols offered in `Sec-WebSocket-Protocol`.
    pub protocols: Vec<String>,

    /// Disable Nagle's algorithm on the TCP socket.
    pub nodelay: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectOptions {
    /// Creates a new options instance with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_queued_messages: DEFAULT_MAX_QUEUED_MESSAGES,
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            protocols: Vec::new(),
            nodelay: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Sets the opening handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the close reply timeout.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Sets the outbound queue limit.
    #[inline]
    #[must_use]
    pub fn with_max_queued_messages(mut self, limit: usize) -> Self {
        self.max_queued_messages = limit;
        self
    }

    /// Sets the inbound message size cap.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, size: Option<usize>) -> Self {
        self.max_message_size = size;
        self
    }

    /// Adds an offered subprotocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds multiple offered subprotocols.
    #[inline]
    #[must_use]
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.handshake_timeout.is_zero() {
            return Err(Error::config("handshake_timeout must be greater than zero"));
        }

        if self.close_timeout.is_zero() {
            return Err(Error::config("close_timeout must be greater than zero"));
        }

        if self.max_queued_messages == 0 {
            return Err(Error::config("max_queued_messages must be greater than zero"));
        }

        if self.max_message_size == Some(0) {
            return Err(Error::config("max_message_size must be greater than zero"));
        }

        for protocol in &self.protocols {
            if protocol.is_empty()
                || protocol
                    .chars()
                    .any(|c| c.is_whitespace() || c == ',' || c.is_control())
            {
                return Err(Error::config(format!("invalid subprotocol name: {protocol:?}")));
            }
        }

        Ok(())
    }

    /// Returns the `Sec-WebSocket-Protocol` header value, if any.
    #[must_use]
    pub fn protocol_header(&self) -> Option<String> {
        (!self.protocols.is_empty()).then(|| self.protocols.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================
