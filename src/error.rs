//! Error types for portable-websocket.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use portable_websocket::{Connection, MessageKind, Result};
//!
//! fn example() -> Result<()> {
//!     let connection = Connection::connect("ws://127.0.0.1:9001")?;
//!     connection.send(MessageKind::Text, b"ping".to_vec())?;
//!     connection.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connect | [`Error::InvalidAddress`], [`Error::UnsupportedScheme`], [`Error::Connect`], [`Error::ConnectionTimeout`] |
//! | Send | [`Error::NotOpen`], [`Error::InvalidPayload`], [`Error::SendQueueFull`] |
//! | Close | [`Error::AlreadyClosed`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Io`] |
//!
//! Abrupt disconnection is never reported as an error value. It is
//! reported by the close callback firing.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;

use crate::transport::ConnectionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connect Errors
    // ========================================================================
    /// Address could not be parsed as a WebSocket URL.
    ///
    /// Returned by `connect` when the address is malformed.
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why the address was rejected.
        message: String,
    },

    /// URL scheme is not supported by the active backend.
    #[error("Unsupported scheme: {scheme}")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The environment refused to create the socket.
    #[error("Connect failed: {message}")]
    Connect {
        /// Description of the failure.
        message: String,
    },

    /// Timed out waiting for a peer to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Send Errors
    // ========================================================================
    /// The connection is closing or closed.
    #[error("Connection not open (state: {state})")]
    NotOpen {
        /// State observed when the send was attempted.
        state: ConnectionState,
    },

    /// Payload cannot be represented as the requested message kind.
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Description of the encoding failure.
        message: String,
    },

    /// Too many frames are waiting for the transport.
    #[error("Send queue full ({limit} messages)")]
    SendQueueFull {
        /// Configured queue limit.
        limit: usize,
    },

    // ========================================================================
    // Close Errors
    // ========================================================================
    /// Close requested on a connection that has already closed.
    ///
    /// Safe to ignore: the connection is closed either way.
    #[error("Connection already closed")]
    AlreadyClosed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported scheme error.
    #[inline]
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    /// Creates a connect error.
    #[inline]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error for the time waited.
    ///
    /// Saturates at `u64::MAX` milliseconds.
    #[inline]
    pub fn connection_timeout(waited: Duration) -> Self {
        Self::ConnectionTimeout {
            timeout_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a not-open error for the observed state.
    #[inline]
    pub fn not_open(state: ConnectionState) -> Self {
        Self::NotOpen { state }
    }

    /// Creates an invalid payload error.
    #[inline]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a send queue full error.
    #[inline]
    pub fn send_queue_full(limit: usize) -> Self {
        Self::SendQueueFull { limit }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from establishing a connection.
    #[inline]
    #[must_use]
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::UnsupportedScheme { .. }
                | Self::Connect { .. }
                | Self::ConnectionTimeout { .. }
        )
    }

    /// Returns `true` if this error came from sending a message.
    #[inline]
    #[must_use]
    pub fn is_send_error(&self) -> bool {
        matches!(
            self,
            Self::NotOpen { .. } | Self::InvalidPayload { .. } | Self::SendQueueFull { .. }
        )
    }

    /// Returns `true` if this error came from a close request.
    #[inline]
    #[must_use]
    pub fn is_close_error(&self) -> bool {
        matches!(self, Self::AlreadyClosed)
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry without reconnecting.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SendQueueFull { .. } | Self::ConnectionTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
