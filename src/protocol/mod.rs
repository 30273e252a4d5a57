//! Message and address types.
//!
//! This module defines what travels over a connection and where it goes.
//!
//! # Message Kinds
//!
//! | Kind | Payload | Wire frame |
//! |------|---------|------------|
//! | [`MessageKind::Text`] | UTF-8 string | text frame |
//! | [`MessageKind::Binary`] | opaque bytes | binary frame |
//!
//! Ping, pong and close frames are handled by the transport and never
//! surface as a [`Message`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `address` | WebSocket URL parsing and validation |
//! | `message` | Message and MessageKind |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket address parsing.
pub mod address;

/// Message data model.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use address::parse_address;
pub use message::{Message, MessageKind};
