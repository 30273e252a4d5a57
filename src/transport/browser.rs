//! Browser WebSocket connection.
//!
//! Wraps the host `WebSocket` object. The browser owns the socket and its
//! event loop drives every callback, so there is no task or lock here: state
//! lives in an `Rc` shared with the JS closures.
//!
//! The socket is switched to `binaryType = "arraybuffer"` before any frame
//! can arrive, so binary frames reach Rust as bytes rather than `Blob`s.

// ============================================================================
// Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use js_sys::{Array, ArrayBuffer, Uint8Array};
use tracing::{debug, info, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::options::ConnectOptions;
use crate::protocol::address::{is_secure, parse_address};
use crate::protocol::{Message, MessageKind};

use super::close_slot::CloseSlot;
use super::state::{ConnectionState, StateCell};
use super::{CloseHandler, MessageHandler, Socket};

// ============================================================================
// Shared
// ============================================================================

/// State shared between the [`Connection`] and the JS event closures.
struct Shared {
    id: ConnectionId,
    state: StateCell,
    /// Frames sent before the socket opened.
    pending: RefCell<VecDeque<Message>>,
    message_handler: RefCell<Option<Rc<dyn Fn(Message)>>>,
    close_slot: RefCell<CloseSlot<CloseHandler>>,
}

impl Shared {
    fn deliver(&self, message: Message) {
        let handler = self.message_handler.borrow().clone();

        match handler {
            Some(handler) => {
                trace!(id = %self.id, kind = %message.kind(), len = message.len(), "Message received");
                handler(message);
            }
            None => {
                debug!(id = %self.id, kind = %message.kind(), "No message handler registered, dropping message");
            }
        }
    }

    fn flush_pending(&self, ws: &WebSocket) {
        let pending: Vec<Message> = self.pending.borrow_mut().drain(..).collect();
        if !pending.is_empty() {
            debug!(id = %self.id, count = pending.len(), "Flushing messages queued before open");
        }

        for message in pending {
            if let Err(e) = write_frame(ws, &message) {
                warn!(id = %self.id, error = ?e, "Failed to send queued message");
            }
        }
    }

    fn finish(&self) {
        self.state.advance(ConnectionState::Closed);

        let dropped = std::mem::take(&mut *self.pending.borrow_mut()).len();
        if dropped > 0 {
            warn!(id = %self.id, count = dropped, "Discarded unsent messages on close");
        }

        self.message_handler.borrow_mut().take();

        let handler = self.close_slot.borrow_mut().fire();

        debug!(id = %self.id, "Connection closed");

        if let Some(handler) = handler {
            handler();
        }
    }
}

/// Writes one frame on the binary-safe or text path as appropriate.
fn write_frame(ws: &WebSocket, message: &Message) -> std::result::Result<(), JsValue> {
    match message {
        Message::Text(text) => ws.send_with_str(text),
        Message::Binary(bytes) => ws.send_with_u8_array(bytes),
    }
}

/// Classifies an inbound event payload.
fn classify(data: JsValue) -> Option<Message> {
    if let Some(text) = data.as_string() {
        return Some(Message::Text(text));
    }

    data.dyn_into::<ArrayBuffer>()
        .ok()
        .map(|buffer| Message::Binary(Uint8Array::new(&buffer).to_vec()))
}

// ============================================================================
// Connection
// ============================================================================

/// Browser WebSocket connection.
///
/// Callbacks run on the browser event loop, one loop turn per event, in the
/// order the browser dispatches them.
///
/// # Pre-open sends
///
/// Frames sent while [`ConnectionState::Connecting`] are queued and written
/// in order from the `open` event. If the socket closes first they are
/// discarded and the close handler fires.
///
/// # Drop
///
/// Dropping detaches all callbacks and closes the socket. No handler runs
/// after drop.
pub struct Connection {
    address: String,
    ws: WebSocket,
    shared: Rc<Shared>,
    max_queued: usize,
    /// Kept alive while attached to `ws`.
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
}

impl Connection {
    /// Connects to `address` with default options.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the address is malformed
    /// - [`Error::UnsupportedScheme`] for schemes other than `ws`/`wss`
    /// - [`Error::Connect`] if the browser refuses to create the socket
    pub fn connect(address: &str) -> Result<Self> {
        Self::connect_with(address, ConnectOptions::default())
    }

    /// Connects to `address` with explicit options.
    ///
    /// # Errors
    ///
    /// As [`Connection::connect`], plus [`Error::Config`] for invalid options.
    pub fn connect_with(address: &str, options: ConnectOptions) -> Result<Self> {
        options.validate()?;

        let url = parse_address(address)?;

        let ws = if options.protocols.is_empty() {
            WebSocket::new(url.as_str())
        } else {
            let protocols: Array = options
                .protocols
                .iter()
                .map(|protocol| JsValue::from_str(protocol))
                .collect();
            WebSocket::new_with_str_sequence(url.as_str(), &protocols)
        }
        .map_err(|e| Error::connect(format!("{e:?}")))?;

        ws.set_binary_type(BinaryType::Arraybuffer);

        let shared = Rc::new(Shared {
            id: ConnectionId::generate(),
            state: StateCell::new(ConnectionState::Connecting),
            pending: RefCell::new(VecDeque::new()),
            message_handler: RefCell::new(None),
            close_slot: RefCell::new(CloseSlot::default()),
        });

        let on_open = {
            let shared = Rc::clone(&shared);
            let ws = ws.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                // A close requested during the handshake wins over the open.
                if shared.state.advance(ConnectionState::Open).is_some() {
                    info!(id = %shared.id, "WebSocket connection established");
                    shared.flush_pending(&ws);
                }
            })
        };

        let on_message = {
            let shared = Rc::clone(&shared);
            Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                match classify(event.data()) {
                    Some(message) => shared.deliver(message),
                    None => warn!(id = %shared.id, "Unsupported message payload"),
                }
            })
        };

        let on_close = {
            let shared = Rc::clone(&shared);
            Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
                debug!(
                    id = %shared.id,
                    code = event.code(),
                    reason = %event.reason(),
                    clean = event.was_clean(),
                    "WebSocket closed"
                );
                shared.finish();
            })
        };

        let on_error = {
            let shared = Rc::clone(&shared);
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                warn!(id = %shared.id, "WebSocket error");
            })
        };

        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        debug!(id = %shared.id, url = %url, "Connecting");

        Ok(Self {
            address: url.into(),
            ws,
            shared,
            max_queued: options.max_queued_messages,
            _on_open: on_open,
            _on_message: on_message,
            _on_close: on_close,
            _on_error: on_error,
        })
    }

    /// Sets the message handler. A later call replaces it.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(Message) + 'static,
    {
        if self.shared.state.get() == ConnectionState::Closed {
            return;
        }
        *self.shared.message_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Sets the close handler.
    ///
    /// Fires exactly once. Runs immediately if the connection already closed.
    pub fn on_close<F>(&self, handler: F)
    where
        F: FnOnce() + 'static,
    {
        let handler = self.shared.close_slot.borrow_mut().register(Box::new(handler));
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Enqueues a message built from a kind tag and raw bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPayload`] if a text payload is not UTF-8
    /// - [`Error::NotOpen`] if the connection is closing or closed
    /// - [`Error::SendQueueFull`] if too many frames wait for the handshake
    pub fn send(&self, kind: MessageKind, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.send_message(Message::from_parts(kind, payload)?)
    }

    /// Enqueues a text message.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    #[inline]
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_message(Message::Text(text.into()))
    }

    /// Enqueues a binary message.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    #[inline]
    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send_message(Message::Binary(bytes.into()))
    }

    /// Enqueues a message.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] if the connection is closing or closed
    /// - [`Error::SendQueueFull`] if too many frames wait for the handshake
    pub fn send_message(&self, message: Message) -> Result<()> {
        match self.shared.state.get() {
            ConnectionState::Connecting => {
                let mut pending = self.shared.pending.borrow_mut();
                if pending.len() >= self.max_queued {
                    warn!(id = %self.shared.id, limit = self.max_queued, "Send queue full");
                    return Err(Error::send_queue_full(self.max_queued));
                }
                pending.push_back(message);
                Ok(())
            }
            ConnectionState::Open => {
                trace!(id = %self.shared.id, kind = %message.kind(), len = message.len(), "Sending message");
                write_frame(&self.ws, &message).map_err(|e| {
                    warn!(id = %self.shared.id, error = ?e, "Failed to send message");
                    Error::not_open(self.shared.state.get())
                })
            }
            state => Err(Error::not_open(state)),
        }
    }

    /// Requests a graceful close.
    ///
    /// The close handler fires later, from the browser's `close` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the connection is already closed.
    pub fn close(&self) -> Result<()> {
        match self.shared.state.advance(ConnectionState::Closing) {
            Some(previous) => {
                debug!(id = %self.shared.id, from = %previous, "Close requested");
                if let Err(e) = self.ws.close() {
                    warn!(id = %self.shared.id, error = ?e, "Close request rejected by browser");
                }
                Ok(())
            }
            None if self.shared.state.get() == ConnectionState::Closed => {
                Err(Error::AlreadyClosed)
            }
            None => Ok(()),
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Returns `true` if the connection is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Returns the target address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the number of frames waiting for the handshake.
    #[inline]
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.shared.pending.borrow().len()
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl Socket for Connection {
    fn connect_with(address: &str, options: ConnectOptions) -> Result<Self> {
        Self::connect_with(address, options)
    }

    fn on_message(&self, handler: MessageHandler) {
        Self::on_message(self, handler);
    }

    fn send(&self, kind: MessageKind, payload: Vec<u8>) -> Result<()> {
        Self::send(self, kind, payload)
    }

    fn close(&self) -> Result<()> {
        Self::close(self)
    }

    fn on_close(&self, handler: CloseHandler) {
        Self::on_close(self, handler);
    }

    fn state(&self) -> ConnectionState {
        Self::state(self)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("queued", &self.queued_messages())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Detach before the closures are freed; the browser may still fire.
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);

        if self.shared.state.get() != ConnectionState::Closed {
            let _ = self.ws.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
