//! Native WebSocket connection and event loop.
//!
//! The connection spawns a tokio task that exclusively owns the socket and
//! handles:
//!
//! - The opening handshake (bounded by the handshake timeout)
//! - Incoming frames, published to the message handler in arrival order
//! - Outgoing frames from [`Connection::send`], written by this task only
//! - The closing handshake and the single close notification
//!
//! Callers never touch the socket. `send` and `close` push commands onto a
//! channel that the task drains in order, so frames enqueued before `close`
//! are flushed before the close frame.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::options::ConnectOptions;
use crate::protocol::address::{is_secure, parse_address};
use crate::protocol::{Message, MessageKind};

use super::close_slot::CloseSlot;
use super::state::{ConnectionState, StateCell};
use super::{CloseHandler, MessageHandler, Socket};

// ============================================================================
// Types
// ============================================================================

/// Shared, clonable form of the registered message handler.
type SharedMessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one frame.
    Send(Message),
    /// Start the closing handshake.
    Close,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the [`Connection`] handle and its event loop.
struct Shared {
    id: ConnectionId,
    state: StateCell,
    /// Frames enqueued but not yet written.
    queued: AtomicUsize,
    message_handler: Mutex<Option<SharedMessageHandler>>,
    close_slot: Mutex<CloseSlot<CloseHandler>>,
    /// Cancels an in-flight handshake.
    shutdown: Notify,
}

impl Shared {
    fn new(state: ConnectionState) -> Self {
        Self {
            id: ConnectionId::generate(),
            state: StateCell::new(state),
            queued: AtomicUsize::new(0),
            message_handler: Mutex::new(None),
            close_slot: Mutex::new(CloseSlot::default()),
            shutdown: Notify::new(),
        }
    }

    /// Hands an inbound message to the registered handler.
    ///
    /// The handler is cloned out of the lock first, so it may re-enter the
    /// connection.
    fn deliver(&self, message: Message) {
        let handler = self.message_handler.lock().clone();

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

    /// Moves to `Closed`, discards unsent frames and fires the close handler.
    fn finish(&self, mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>) {
        self.state.advance(ConnectionState::Closed);

        command_rx.close();
        let mut dropped = 0usize;
        while let Ok(command) = command_rx.try_recv() {
            if let ConnectionCommand::Send(_) = command {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(id = %self.id, count = dropped, "Discarded unsent messages on close");
        }

        // Break reference cycles through handlers that capture the connection.
        let handler = self.message_handler.lock().take();
        drop(handler);

        let handler = self.close_slot.lock().fire();

        debug!(id = %self.id, "Connection closed");

        if let Some(handler) = handler {
            handler();
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Native WebSocket connection.
///
/// Owns exactly one socket through its event loop task. Messages and the
/// close notification are delivered on that task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. `send` and `close` never block and may be
/// called from any thread, including from inside the handlers.
///
/// # Pre-open sends
///
/// Frames sent while [`ConnectionState::Connecting`] are queued and written
/// in order once the handshake completes. If the handshake fails, times out
/// or is cancelled they are discarded and the close handler fires.
pub struct Connection {
    /// Target URL, or `ws://{peer}` for accepted connections.
    address: String,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// State shared with the event loop.
    shared: Arc<Shared>,
    /// Outbound queue limit.
    max_queued: usize,
}

impl Connection {
    /// Connects to `address` with default options.
    ///
    /// Returns immediately; the handshake continues in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the address is malformed
    /// - [`Error::UnsupportedScheme`] for non-`ws` schemes (TLS is not built in)
    /// - [`Error::Connect`] if called outside a tokio runtime
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
        if is_secure(&url) {
            return Err(Error::unsupported_scheme(url.scheme()));
        }

        let runtime = Handle::try_current()
            .map_err(|e| Error::connect(format!("no tokio runtime available: {e}")))?;

        let request = Self::build_request(url.as_str(), &options)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(ConnectionState::Connecting));

        debug!(id = %shared.id, url = %url, "Connecting");

        runtime.spawn(Self::run_client(
            request,
            options.clone(),
            command_rx,
            Arc::clone(&shared),
        ));

        Ok(Self {
            address: url.into(),
            command_tx,
            shared,
            max_queued: options.max_queued_messages,
        })
    }

    /// Wraps a stream whose server-side handshake already completed.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn accepted<S>(
        ws_stream: WebSocketStream<S>,
        peer: SocketAddr,
        options: &ConnectOptions,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(ConnectionState::Open));

        debug!(id = %shared.id, %peer, "Accepted connection");

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&shared),
            options.close_timeout,
        ));

        Self {
            address: format!("ws://{peer}"),
            command_tx,
            shared,
            max_queued: options.max_queued_messages,
        }
    }

    /// Builds the client handshake request.
    fn build_request(url: &str, options: &ConnectOptions) -> Result<Request> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::invalid_address(url, e.to_string()))?;

        if let Some(protocols) = options.protocol_header() {
            let value = HeaderValue::from_str(&protocols)
                .map_err(|e| Error::config(format!("invalid subprotocol header: {e}")))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(request)
    }

    /// Protocol configuration for the underlying stream.
    pub(crate) fn ws_config(options: &ConnectOptions) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = options.max_message_size;
        config
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Sets the message handler.
    ///
    /// Called on the connection's task for every inbound text or binary
    /// message, in arrival order. A later call replaces the handler.
    /// Messages that arrive while no handler is set are dropped.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        if self.shared.state.get() == ConnectionState::Closed {
            return;
        }
        let previous = self.shared.message_handler.lock().replace(Arc::new(handler));
        drop(previous);
    }

    /// Sets the close handler.
    ///
    /// Fires exactly once when the connection reaches
    /// [`ConnectionState::Closed`], whatever the cause. If the connection is
    /// already closed the handler runs immediately on the calling thread.
    pub fn on_close<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handler = self.shared.close_slot.lock().register(Box::new(handler));
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
    /// - [`Error::SendQueueFull`] if too many frames are waiting
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
    /// Success means the frame is queued for the event loop, not that the
    /// peer received it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] if the connection is closing or closed
    /// - [`Error::SendQueueFull`] if too many frames are waiting
    pub fn send_message(&self, message: Message) -> Result<()> {
        let state = self.shared.state.get();
        if !state.accepts_sends() {
            return Err(Error::not_open(state));
        }

        let queued = self.shared.queued.fetch_add(1, Ordering::AcqRel);
        if queued >= self.max_queued {
            self.shared.queued.fetch_sub(1, Ordering::AcqRel);
            warn!(id = %self.shared.id, limit = self.max_queued, "Send queue full");
            return Err(Error::send_queue_full(self.max_queued));
        }

        if self
            .command_tx
            .send(ConnectionCommand::Send(message))
            .is_err()
        {
            self.shared.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::not_open(self.shared.state.get()));
        }

        Ok(())
    }

    /// Requests a graceful close.
    ///
    /// Does not invoke the close handler; that fires from the event loop once
    /// the socket is actually closed. Calling this while already closing is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the connection is already closed.
    pub fn close(&self) -> Result<()> {
        match self.shared.state.advance(ConnectionState::Closing) {
            Some(previous) => {
                debug!(id = %self.shared.id, from = %previous, "Close requested");
                let _ = self.command_tx.send(ConnectionCommand::Close);
                if previous == ConnectionState::Connecting {
                    self.shared.shutdown.notify_one();
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

    /// Returns the number of frames waiting to be written.
    #[inline]
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Performs the client handshake, then runs the event loop.
    async fn run_client(
        request: Request,
        options: ConnectOptions,
        command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) {
        let handshake = tokio_tungstenite::connect_async_with_config(
            request,
            Some(Self::ws_config(&options)),
            options.nodelay,
        );

        let outcome = tokio::select! {
            result = timeout(options.handshake_timeout, handshake) => result,
            () = shared.shutdown.notified() => {
                debug!(id = %shared.id, "Handshake cancelled by close");
                shared.finish(command_rx);
                return;
            }
        };

        match outcome {
            Ok(Ok((mut ws_stream, _response))) => {
                // A close requested during the handshake wins over the open.
                if shared.state.advance(ConnectionState::Open).is_none() {
                    debug!(id = %shared.id, "Handshake completed after close request");
                    let _ = ws_stream.close(None).await;
                    shared.finish(command_rx);
                    return;
                }

                info!(id = %shared.id, "WebSocket connection established");
                Self::run_event_loop(ws_stream, command_rx, shared, options.close_timeout).await;
            }
            Ok(Err(e)) => {
                warn!(id = %shared.id, error = %e, "WebSocket handshake failed");
                shared.finish(command_rx);
            }
            Err(_) => {
                warn!(
                    id = %shared.id,
                    timeout = ?options.handshake_timeout,
                    "WebSocket handshake timed out"
                );
                shared.finish(command_rx);
            }
        }
    }

    /// Event loop that handles WebSocket I/O until the socket closes.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
        close_timeout: Duration,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut close_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                // Incoming frames from the peer
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Close(frame))) => {
                            debug!(id = %shared.id, ?frame, "WebSocket closed by remote");
                            shared.state.advance(ConnectionState::Closing);
                            // Flushes the close reply queued by the protocol layer.
                            let _ = ws_write.flush().await;
                            break;
                        }

                        Some(Ok(frame)) => {
                            if let Some(message) = Message::from_frame(frame) {
                                shared.deliver(message);
                            }
                        }

                        Some(Err(e)) => {
                            warn!(id = %shared.id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(id = %shared.id, "WebSocket stream ended");
                            break;
                        }
                    }
                }

                // Commands from the handle
                command = command_rx.recv(), if close_deadline.is_none() => {
                    match command {
                        Some(ConnectionCommand::Send(message)) => {
                            shared.queued.fetch_sub(1, Ordering::AcqRel);
                            trace!(id = %shared.id, kind = %message.kind(), len = message.len(), "Sending message");

                            if let Err(e) = ws_write.send(message.into()).await {
                                warn!(id = %shared.id, error = %e, "Failed to send message");
                                break;
                            }
                        }

                        // The handle was dropped without an explicit close.
                        Some(ConnectionCommand::Close) | None => {
                            shared.state.advance(ConnectionState::Closing);

                            if let Err(e) = ws_write.close().await {
                                debug!(id = %shared.id, error = %e, "Close frame not sent");
                                break;
                            }

                            trace!(id = %shared.id, "Close frame sent");
                            close_deadline = Some(Instant::now() + close_timeout);
                        }
                    }
                }

                // Peer never answered our close frame
                () = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                    debug!(id = %shared.id, "Close reply timed out");
                    break;
                }
            }
        }

        shared.finish(command_rx);
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
        // Handlers keep running until the close completes.
        let _ = self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
