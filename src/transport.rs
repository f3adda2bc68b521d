//! Transport abstraction between the room server and one client.
//!
//! The [`Transport`] trait is a bidirectional text message channel. The game
//! protocol is JSON text, so every implementation handles its own framing
//! (WebSocket frames, length-prefixed TCP, in-memory channels in tests).
//!
//! Accepting connections is not part of the trait: build a connected
//! transport externally, then hand it to [`serve_connection`].
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use uno_server::error::ServerError;
//! use uno_server::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ServerError> {
//!         // Write one JSON text message to the client
//!         # let _ = message;
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ServerError>> {
//!         // Next JSON text message; None once the client is gone
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ServerError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::ServerError;
use crate::protocol::ClientMessage;
use crate::server::RoomServer;

/// A bidirectional text message transport to one client.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message
/// and each call to [`recv`](Transport::recv) yields one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because
/// [`serve_connection`] polls it inside `tokio::select!`. Channel-based
/// implementations (e.g. wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the client.
    ///
    /// # Errors
    ///
    /// [`ServerError::TransportSend`] if the message could not be written.
    async fn send(&mut self, message: String) -> Result<(), ServerError>;

    /// Receive the next JSON text message from the client.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the client closed the connection
    async fn recv(&mut self) -> Option<Result<String, ServerError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), ServerError>;
}

/// Run one client connection against `server` until either side closes.
///
/// Incoming text is decoded as [`ClientMessage`]; malformed JSON is logged and
/// skipped. Everything the server queues for this connection is encoded and
/// written out. When the function returns the client is disconnected from
/// the server, which suspends their seat if a game is running.
///
/// # Errors
///
/// The transport's own send/receive errors, or
/// [`ServerError::ServerClosed`] if the server stopped before the client
/// could be registered.
pub async fn serve_connection(
    mut transport: impl Transport,
    server: &RoomServer,
) -> Result<(), ServerError> {
    let (handle, mut outbound) = server.connect()?;
    debug!(conn = %handle.id(), "serving connection");

    let result = loop {
        tokio::select! {
            msg = outbound.recv() => {
                match msg {
                    Some(msg) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("failed to serialize ServerMessage: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = transport.send(json).await {
                            error!(conn = %handle.id(), "transport send error: {e}");
                            break Err(e);
                        }
                    }
                    // The server shut down.
                    None => {
                        debug!(conn = %handle.id(), "outbound channel closed, closing transport");
                        let _ = transport.close().await;
                        break Ok(());
                    }
                }
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => {
                            if let Err(e) = handle.send(msg) {
                                let _ = transport.close().await;
                                break Err(e);
                            }
                        }
                        Err(e) => {
                            warn!(conn = %handle.id(), "failed to deserialize client message: {e}; raw: {text}");
                        }
                    },
                    Some(Err(e)) => {
                        error!(conn = %handle.id(), "transport receive error: {e}");
                        break Err(e);
                    }
                    None => {
                        debug!(conn = %handle.id(), "transport closed by client");
                        break Ok(());
                    }
                }
            }
        }
    };

    drop(handle);
    result
}
