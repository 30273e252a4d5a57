//! Portable WebSocket - Full-duplex message connections for native and browser targets.
//!
//! This library provides one small connection API for sending text and
//! binary messages and receiving them through callbacks, whether the code
//! runs natively on tokio or inside a browser on `wasm32`.
//!
//! # Architecture
//!
//! The connection follows a handle/driver model:
//!
//! - **Handle (caller)**: [`Connection`] exposes `send`, `close` and handler registration
//! - **Driver (transport)**: owns the socket and invokes the handlers
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns exactly one socket
//! - `connect` returns immediately; sends before the handshake are queued
//! - Messages reach the handler in arrival order, text and binary interleaved
//! - The close handler fires exactly once, never from inside `close`
//!
//! # Quick Start
//!
//! ```no_run
//! use portable_websocket::{Connection, Message, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::connect("ws://127.0.0.1:9001")?;
//!
//!     connection.on_message(|message: Message| println!("received {message:?}"));
//!     connection.on_close(|| println!("closed"));
//!
//!     connection.send_text("ping")?;
//!     connection.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`options`] | Connection configuration |
//! | [`protocol`] | Message and address types |
//! | [`transport`] | Connection backends and [`Socket`] trait |
//!
//! # Backends
//!
//! - **Native**: a tokio task owns a `tokio-tungstenite` stream
//! - **Browser** (`wasm32`): wraps the host `WebSocket` object

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection configuration.
///
/// Use [`ConnectOptions::new()`] and the `with_*` methods to tune a connection.
pub mod options;

/// Message and address types.
pub mod protocol;

/// Connection backends.
///
/// [`Connection`] resolves to the backend for the current target.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Option types
pub use options::ConnectOptions;

// Protocol types
pub use protocol::{Message, MessageKind};

// Transport types
pub use transport::{CloseHandler, Connection, ConnectionState, MessageHandler, Socket};

#[cfg(not(target_arch = "wasm32"))]
pub use transport::Listener;
