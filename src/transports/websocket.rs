//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] wraps the server side of an accepted WebSocket
//! connection. Text frames carry protocol JSON; binary frames are skipped.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), uno_server::ServerError> {
//! use uno_server::config::ServerConfig;
//! use uno_server::{serve_connection, RoomServer, WebSocketTransport};
//!
//! let server = std::sync::Arc::new(RoomServer::start(ServerConfig::new()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!
//! loop {
//!     let (tcp, _) = listener.accept().await?;
//!     let server = std::sync::Arc::clone(&server);
//!     tokio::spawn(async move {
//!         if let Ok(transport) = WebSocketTransport::accept(tcp).await {
//!             let _ = serve_connection(transport, &server).await;
//!         }
//!     });
//! }
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ServerError;
use crate::transport::Transport;

/// The server side of an accepted WebSocket connection.
pub type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A [`Transport`] backed by an accepted WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes loses no messages.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Run the WebSocket handshake on an accepted TCP connection.
    ///
    /// # Errors
    ///
    /// [`ServerError::Io`] if the handshake fails. An underlying I/O error
    /// keeps its [`ErrorKind`](std::io::ErrorKind); anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn accept(tcp: TcpStream) -> Result<Self, ServerError> {
        let peer = tcp.peer_addr().ok();
        let stream = tokio_tungstenite::accept_async(tcp).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ServerError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::debug!(?peer, "WebSocket connection accepted");
        Ok(Self::from_stream(stream))
    }

    /// Like [`accept`](Self::accept), failing with [`ServerError::Timeout`]
    /// if the handshake does not finish in time.
    ///
    /// # Errors
    ///
    /// [`ServerError::Timeout`], or anything [`accept`](Self::accept) returns.
    pub async fn accept_with_timeout(
        tcp: TcpStream,
        timeout: std::time::Duration,
    ) -> Result<Self, ServerError> {
        tokio::time::timeout(timeout, Self::accept(tcp))
            .await
            .map_err(|_| ServerError::Timeout)?
    }

    /// Wrap a stream whose handshake was done elsewhere.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ServerError> {
        if self.closed {
            return Err(ServerError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ServerError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ServerError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ServerError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ServerError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::server::RoomServer;
    use crate::transport::serve_connection;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio_tungstenite::connect_async;

    /// Accept one connection, wrap it, and run `handler` on the transport.
    async fn start_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketTransport) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let transport = WebSocketTransport::accept(tcp).await.unwrap();
            handler(transport).await;
        });

        format!("ws://{addr}")
    }

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_traits<T: Send + std::fmt::Debug>() {}
        assert_traits::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let url = start_server(|mut transport| async move {
            let _ = tx.send(transport.recv().await);
        })
        .await;

        let (mut client, _) = connect_async(&url).await.unwrap();
        client
            .send(Message::Binary(vec![0xDE, 0xAD].into()))
            .await
            .unwrap();
        client.send(Message::Text("after_binary".into())).await.unwrap();

        let received = rx.await.unwrap().unwrap().unwrap();
        assert_eq!(received, "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let url = start_server(|mut transport| async move {
            transport.close().await.unwrap();
            // A second close is a no-op.
            transport.close().await.unwrap();
            let _ = tx.send(transport.send("late".to_string()).await);
        })
        .await;

        let (mut client, _) = connect_async(&url).await.unwrap();
        while let Some(Ok(_)) = client.next().await {}

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, ServerError::TransportClosed));
    }

    #[tokio::test]
    async fn accept_fails_on_plain_tcp_garbage() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut tcp = TcpStream::connect(addr).await.unwrap();
            tcp.write_all(b"not a websocket handshake\r\n\r\n").await.unwrap();
        });

        let (tcp, _) = listener.accept().await.unwrap();
        let err = WebSocketTransport::accept(tcp).await.unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
        client.await.unwrap();
    }

    #[tokio::test]
    async fn ping_over_a_real_socket() {
        let server = Arc::new(RoomServer::start(ServerConfig::new().with_seed(5)));
        let served = Arc::clone(&server);
        let url = start_server(move |transport| async move {
            let _ = serve_connection(transport, &served).await;
        })
        .await;

        let (mut client, _) = connect_async(&url).await.unwrap();
        let ping = serde_json::to_string(&ClientMessage::Ping).unwrap();
        client.send(Message::Text(ping.into())).await.unwrap();

        let reply = loop {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => break text.to_string(),
                _ => continue,
            }
        };
        let msg: ServerMessage = serde_json::from_str(&reply).unwrap();
        assert_eq!(msg, ServerMessage::Pong);
    }
}
