//! Message data model.
//!
//! A [`Message`] is one discrete frame as seen by the caller: either UTF-8
//! text or opaque bytes. Control frames (ping, pong, close) never appear
//! here; the transport handles them.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

// ============================================================================
// MessageKind
// ============================================================================

/// Kind tag of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text frame.
    Text,
    /// Binary frame.
    Binary,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A text or binary message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Message {
    /// UTF-8 text payload.
    Text(String),
    /// Opaque byte payload.
    Binary(Vec<u8>),
}

impl Message {
    /// Builds a message from a kind tag and raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if `kind` is [`MessageKind::Text`]
    /// and `payload` is not valid UTF-8.
    pub fn from_parts(kind: MessageKind, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        match kind {
            MessageKind::Text => String::from_utf8(payload)
                .map(Self::Text)
                .map_err(|e| Error::invalid_payload(format!("text payload is not UTF-8: {e}"))),
            MessageKind::Binary => Ok(Self::Binary(payload)),
        }
    }

    /// Returns the kind tag.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Binary(_) => MessageKind::Binary,
        }
    }

    /// Returns the payload bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the text, if this is a text message.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits into kind tag and payload bytes.
    #[must_use]
    pub fn into_parts(self) -> (MessageKind, Vec<u8>) {
        match self {
            Self::Text(text) => (MessageKind::Text, text.into_bytes()),
            Self::Binary(bytes) => (MessageKind::Binary, bytes),
        }
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

// ============================================================================
// Native Frame Conversion
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl From<Message> for WsMessage {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => WsMessage::Text(text.into()),
            Message::Binary(bytes) => WsMessage::Binary(bytes.into()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Message {
    /// Classifies an inbound frame.
    ///
    /// Returns `None` for control and raw frames.
    pub(crate) fn from_frame(frame: WsMessage) -> Option<Self> {
        match frame {
            WsMessage::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            WsMessage::Binary(bytes) => Some(Self::Binary(bytes.to_vec())),
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_text() {
        let message = Message::from_parts(MessageKind::Text, "héllo".as_bytes()).expect("utf-8");
        assert_eq!(message, Message::Text("héllo".to_string()));
        assert_eq!(message.kind(), MessageKind::Text);
    }

    #[test]
    fn test_from_parts_rejects_invalid_utf8() {
        let err = Message::from_parts(MessageKind::Text, vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
        assert!(err.is_send_error());
    }

    #[test]
    fn test_binary_accepts_any_bytes() {
        let message = Message::from_parts(MessageKind::Binary, vec![0x00, 0xff, 0x10]).unwrap();
        assert_eq!(message.as_bytes(), &[0x00, 0xff, 0x10]);
        assert_eq!(message.as_text(), None);
        assert_eq!(message.len(), 3);
    }

    #[test]
    fn test_into_parts_preserves_kind() {
        let (kind, bytes) = Message::from("ping").into_parts();
        assert_eq!(kind, MessageKind::Text);
        assert_eq!(bytes, b"ping");

        let (kind, bytes) = Message::from(vec![1u8, 2, 3]).into_parts();
        assert_eq!(kind, MessageKind::Binary);
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty() {
        assert!(Message::Text(String::new()).is_empty());
        assert!(!Message::Binary(vec![0]).is_empty());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_frame_classification() {
        let text = Message::from_frame(WsMessage::Text(String::from("hi").into()));
        assert_eq!(text, Some(Message::Text("hi".to_string())));

        let binary = Message::from_frame(WsMessage::Binary(vec![9u8, 8].into()));
        assert_eq!(binary, Some(Message::Binary(vec![9, 8])));

        assert_eq!(Message::from_frame(WsMessage::Ping(Default::default())), None);
        assert_eq!(Message::from_frame(WsMessage::Close(None)), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_binary_frame_not_reencoded() {
        let frame: WsMessage = Message::Binary(vec![0x00, 0xff]).into();
        assert!(frame.is_binary());
        assert_eq!(frame.into_data().to_vec(), vec![0x00, 0xff]);
    }
}
