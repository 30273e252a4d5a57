//! Connection lifecycle state.
//!
//! ```text
//! Connecting ──► Open ──► Closing ──► Closed
//!     │                      ▲          ▲
//!     └──────────────────────┴──────────┘
//! ```
//!
//! States only advance. Nothing leaves `Closed`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Opening handshake in progress.
    Connecting = 0,
    /// Handshake complete, messages flow both ways.
    Open = 1,
    /// Close requested locally or by the peer.
    Closing = 2,
    /// Terminal. The close callback has fired or is firing.
    Closed = 3,
}

impl ConnectionState {
    /// Returns `true` if a transition from `self` to `next` is allowed.
    #[inline]
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        (next as u8) > (self as u8)
    }

    /// Returns `true` if `send` may enqueue frames in this state.
    #[inline]
    #[must_use]
    pub const fn accepts_sends(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// StateCell
// ============================================================================

/// Atomic holder for a [`ConnectionState`].
///
/// Shared between the caller-facing handle and the transport's read path.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` if that is a forward transition.
    ///
    /// Returns the previous state on success.
    pub(crate) fn advance(&self, next: ConnectionState) -> Option<ConnectionState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                ConnectionState::from_u8(current)
                    .can_advance_to(next)
                    .then_some(next as u8)
            })
            .ok()
            .map(ConnectionState::from_u8)
    }
}

// ============================================================================
// Tests
// ============================================================================
