//! # UNO Server
//!
//! Authoritative rules engine and room/session layer for real-time
//! multiplayer UNO.
//!
//! The crate is split the way the game is played:
//!
//! - [`card`], [`deck`] and [`rules`] model the 108-card deck and what may be
//!   played on what.
//! - [`engine::TurnEngine`] is the per-room state machine. It is pure and
//!   synchronous; time comes in as an argument.
//! - [`room::RoomRegistry`] owns rooms, membership, hosts and reconnection.
//! - [`server::RoomServer`] runs the registry inside a single tokio actor and
//!   speaks the JSON [`protocol`] to any [`Transport`].
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] for any framing.
//! - **WebSocket built-in**: the default `transport-websocket` feature
//!   provides `WebSocketTransport`.
//! - **Hidden hands**: clients only ever receive [`projection`] views.
//!
//! ## Quick Start
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> uno_server::Result<()> {
//! use uno_server::config::ServerConfig;
//! use uno_server::{ClientMessage, RoomServer, ServerMessage};
//!
//! let server = RoomServer::start(ServerConfig::new());
//! let (conn, mut inbox) = server.connect()?;
//!
//! conn.send(ClientMessage::CreateRoom { player_name: "Ann".into() })?;
//! if let Some(ServerMessage::RoomJoined { room, .. }) = inbox.recv().await {
//!     assert_eq!(room.code.len(), 6);
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod card;
pub mod clock;
pub mod config;
pub mod deck;
pub mod engine;
pub mod error;
pub mod error_codes;
pub mod projection;
pub mod protocol;
pub mod room;
pub mod rules;
pub mod server;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use error::{GameError, Result, RoomError, ServerError};
pub use error_codes::ErrorCode;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{ConnectionHandle, RoomServer};
pub use transport::{serve_connection, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
