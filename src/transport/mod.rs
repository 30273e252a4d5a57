//! WebSocket transport layer.
//!
//! One connection contract, one implementation per execution environment:
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │        Socket (trait)        │
//!            │ connect · send · close       │
//!            │ on_message · on_close        │
//!            └──────────────┬───────────────┘
//!                 ┌─────────┴──────────┐
//!   ┌─────────────▼─────────┐  ┌───────▼───────────────┐
//!   │ native Connection     │  │ browser Connection    │
//!   │ tokio task owns the   │  │ host WebSocket object │
//!   │ tungstenite stream    │  │ drives the callbacks  │
//!   └───────────────────────┘  └───────────────────────┘
//! ```
//!
//! The native backend is compiled on every target except `wasm32`, the
//! browser backend only on `wasm32`. Both are exported as [`Connection`].
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Validate the address, start the handshake
//! 2. `Connection::on_message` / `on_close` - Register handlers
//! 3. `Connection::send` - Queue frames (buffered until `Open`)
//! 4. `Connection::close` - Request shutdown; `on_close` fires later
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | Lifecycle states and transitions |
//! | `connection` | Native connection and event loop |
//! | `server` | Native listener for inbound peers |
//! | `browser` | Browser (`wasm32`) connection |

// ============================================================================
// Submodules
// ============================================================================

/// Exactly-once close callback storage.
mod close_slot;

/// Connection lifecycle state.
pub mod state;

/// Native WebSocket connection and event loop.
#[cfg(not(target_arch = "wasm32"))]
pub mod connection;

/// Native WebSocket listener.
#[cfg(not(target_arch = "wasm32"))]
pub mod server;

/// Browser WebSocket connection.
#[cfg(target_arch = "wasm32")]
pub mod browser;

// ============================================================================
// Re-exports
// ============================================================================

pub use state::ConnectionState;

#[cfg(not(target_arch = "wasm32"))]
pub use connection::Connection;
#[cfg(not(target_arch = "wasm32"))]
pub use server::Listener;

#[cfg(target_arch = "wasm32")]
pub use browser::Connection;

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::options::ConnectOptions;
use crate::protocol::{Message, MessageKind};

// ============================================================================
// Handler Types
// ============================================================================

/// Message handler callback type.
///
/// Called once per inbound text or binary message, in arrival order.
#[cfg(not(target_arch = "wasm32"))]
pub type MessageHandler = Box<dyn Fn(Message) + Send + Sync>;

/// Message handler callback type.
///
/// Called once per inbound text or binary message, in arrival order.
#[cfg(target_arch = "wasm32")]
pub type MessageHandler = Box<dyn Fn(Message)>;

/// Close handler callback type.
///
/// Called exactly once when the connection reaches `Closed`.
#[cfg(not(target_arch = "wasm32"))]
pub type CloseHandler = Box<dyn FnOnce() + Send>;

/// Close handler callback type.
///
/// Called exactly once when the connection reaches `Closed`.
#[cfg(target_arch = "wasm32")]
pub type CloseHandler = Box<dyn FnOnce()>;

// ============================================================================
// Socket
// ============================================================================

/// Capability set shared by every backend.
///
/// Code written against `Socket` runs unchanged on native targets and in
/// the browser.
///
/// # Example
///
/// ```ignore
/// use portable_websocket::{MessageKind, Result, Socket};
///
/// fn greet<S: Socket>(socket: &S) -> Result<()> {
///     socket.on_message(Box::new(|message| println!("{message:?}")));
///     socket.send(MessageKind::Text, b"hello".to_vec())
/// }
/// ```
pub trait Socket: Sized {
    /// Starts connecting to `address`. Returns before the handshake completes.
    ///
    /// # Errors
    ///
    /// Returns a connect-category error if the address is malformed or the
    /// environment refuses to create the socket.
    fn connect(address: &str) -> Result<Self> {
        Self::connect_with(address, ConnectOptions::default())
    }

    /// Starts connecting to `address` with explicit options.
    ///
    /// # Errors
    ///
    /// As [`Socket::connect`], plus configuration errors.
    fn connect_with(address: &str, options: ConnectOptions) -> Result<Self>;

    /// Registers the single inbound message handler.
    fn on_message(&self, handler: MessageHandler);

    /// Enqueues one message.
    ///
    /// # Errors
    ///
    /// Returns a send-category error if the connection is not open or the
    /// payload cannot be encoded as `kind`.
    fn send(&self, kind: MessageKind, payload: Vec<u8>) -> Result<()>;

    /// Requests a graceful close.
    ///
    /// # Errors
    ///
    /// Returns a close-category error if the connection is already closed.
    fn close(&self) -> Result<()>;

    /// Registers the single close handler.
    fn on_close(&self, handler: CloseHandler);

    /// Returns the current lifecycle state.
    fn state(&self) -> ConnectionState;
}
