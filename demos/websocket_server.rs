//! # WebSocket Server Demo
//!
//! Serves the UNO protocol over WebSocket on one port:
//!
//! 1. Start the room actor
//! 2. Accept TCP connections and upgrade them to WebSocket
//! 3. Hand each one to `serve_connection`
//! 4. Shut the actor down on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! cargo run --example websocket_server
//!
//! # Override the bind address:
//! UNO_ADDR=0.0.0.0:9000 cargo run --example websocket_server
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use uno_server::config::ServerConfig;
use uno_server::{serve_connection, RoomServer, WebSocketTransport};

/// Default bind address when `UNO_ADDR` is not set.
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// How long a client gets to finish the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for per-intent output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let addr = std::env::var("UNO_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let server = Arc::new(RoomServer::start(ServerConfig::new()));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on ws://{addr}");

    // ── Accept loop ─────────────────────────────────────────────────
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (tcp, peer) = accepted?;
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let transport = match WebSocketTransport::accept_with_timeout(tcp, HANDSHAKE_TIMEOUT).await {
                        Ok(transport) => transport,
                        Err(e) => {
                            tracing::warn!(%peer, "handshake failed: {e}");
                            return;
                        }
                    };
                    if let Err(e) = serve_connection(transport, &server).await {
                        tracing::warn!(%peer, "connection ended with error: {e}");
                    }
                });
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // Connections still running hold their own clones; drop ours and let the
    // last one abort the actor, or stop it cleanly if we are the only owner.
    match Arc::try_unwrap(server) {
        Ok(mut server) => server.shutdown().await,
        Err(shared) => drop(shared),
    }
    Ok(())
}
