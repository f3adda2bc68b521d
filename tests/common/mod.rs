#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for UNO server integration tests.
//!
//! Provides a channel-driven [`MockTransport`] for exercising
//! `serve_connection`, and a [`TestClient`] that talks to a `RoomServer`
//! directly through a connection handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uno_server::card::Color;
use uno_server::config::ServerConfig;
use uno_server::engine::PlayerId;
use uno_server::projection::ClientGameState;
use uno_server::room::RoomSnapshot;
use uno_server::rules::is_legal_play;
use uno_server::{ClientMessage, ConnectionHandle, RoomServer, ServerError, ServerMessage, Transport};

/// How long to wait for any single server message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-driven mock transport.
///
/// The test side holds a [`MockPeer`]: text pushed into `to_server` is what
/// the transport yields from `recv`, and everything the server writes shows
/// up on `from_server`. Dropping `to_server` looks like the client hanging up.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

/// The client's end of a [`MockTransport`].
pub struct MockPeer {
    pub to_server: mpsc::UnboundedSender<String>,
    pub from_server: mpsc::UnboundedReceiver<String>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, MockPeer) {
        let (to_server, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_server) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming,
            outgoing,
            closed: Arc::clone(&closed),
        };
        let peer = MockPeer {
            to_server,
            from_server,
            closed,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ServerError> {
        self.outgoing
            .send(message)
            .map_err(|e| ServerError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ServerError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl MockPeer {
    pub fn send(&self, msg: &ClientMessage) {
        self.to_server
            .send(serde_json::to_string(msg).expect("encode client message"))
            .expect("transport dropped");
    }

    pub async fn next(&mut self) -> ServerMessage {
        let text = tokio::time::timeout(RECV_TIMEOUT, self.from_server.recv())
            .await
            .expect("timed out waiting for server text")
            .expect("transport closed");
        serde_json::from_str(&text).expect("decode server message")
    }
}

// ── TestClient ──────────────────────────────────────────────────────

/// A connection to a [`RoomServer`] plus its inbox.
pub struct TestClient {
    pub conn: ConnectionHandle,
    pub inbox: mpsc::Receiver<ServerMessage>,
    pub player_id: Option<PlayerId>,
}

impl TestClient {
    pub fn connect(server: &RoomServer) -> Self {
        let (conn, inbox) = server.connect().expect("server running");
        Self {
            conn,
            inbox,
            player_id: None,
        }
    }

    pub fn send(&self, msg: ClientMessage) {
        self.conn.send(msg).expect("server running");
    }

    pub fn id(&self) -> PlayerId {
        self.player_id.expect("client has not joined a room")
    }

    pub async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(RECV_TIMEOUT, self.inbox.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("outbound channel closed")
    }

    /// Skip messages until `pick` accepts one.
    pub async fn expect<T>(&mut self, mut pick: impl FnMut(ServerMessage) -> Option<T>) -> T {
        loop {
            if let Some(found) = pick(self.next().await) {
                return found;
            }
        }
    }

    /// Everything already queued, without waiting.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            out.push(msg);
        }
        out
    }

    pub async fn rejection(&mut self) -> (String, uno_server::ErrorCode) {
        self.expect(|msg| match msg {
            ServerMessage::IntentRejected {
                reason, error_code, ..
            } => Some((reason, error_code)),
            _ => None,
        })
        .await
    }

    pub async fn create(&mut self, name: &str) -> RoomSnapshot {
        self.send(ClientMessage::CreateRoom {
            player_name: name.into(),
        });
        self.joined().await
    }

    pub async fn join(&mut self, code: &str, name: &str) -> RoomSnapshot {
        self.send(ClientMessage::JoinRoom {
            room_code: code.into(),
            player_name: name.into(),
        });
        self.joined().await
    }

    async fn joined(&mut self) -> RoomSnapshot {
        let (room, player_id) = self
            .expect(|msg| match msg {
                ServerMessage::RoomJoined {
                    room, player_id, ..
                } => Some((room, player_id)),
                _ => None,
            })
            .await;
        self.player_id = Some(player_id);
        room
    }

    pub async fn game_started(&mut self) -> ClientGameState {
        self.expect(|msg| match msg {
            ServerMessage::GameStarted(state) => Some(*state),
            _ => None,
        })
        .await
    }

    pub async fn state_update(&mut self) -> ClientGameState {
        self.expect(|msg| match msg {
            ServerMessage::GameStateUpdated(state) => Some(*state),
            _ => None,
        })
        .await
    }

    pub async fn toast(&mut self) -> String {
        self.expect(|msg| match msg {
            ServerMessage::Toast { message } => Some(message),
            _ => None,
        })
        .await
    }
}

// ── Scenario helpers ────────────────────────────────────────────────

/// Install a test subscriber once. `RUST_LOG=debug` shows the actor's logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic server config for tests.
pub fn config() -> ServerConfig {
    init_tracing();
    ServerConfig::new().with_seed(42)
}

/// Create a room with `names[0]` as host, join the rest, start the game.
///
/// Returns the clients in seat order, the room code, and each client's
/// opening view.
pub async fn started_game(
    server: &RoomServer,
    names: &[&str],
) -> (Vec<TestClient>, String, Vec<ClientGameState>) {
    let mut clients: Vec<TestClient> = names.iter().map(|_| TestClient::connect(server)).collect();
    let code = clients[0].create(names[0]).await.code;
    for (client, name) in clients.iter_mut().zip(names).skip(1) {
        client.join(&code, name).await;
    }

    clients[0].send(ClientMessage::StartGame);
    let mut states = Vec::new();
    for client in &mut clients {
        states.push(client.game_started().await);
    }
    (clients, code, states)
}

/// The move the current player makes: a legal card if they hold one,
/// otherwise a draw. Wilds pick red.
pub fn next_move(state: &ClientGameState) -> ClientMessage {
    let top = state.discard_pile.last().expect("a started game has a top card");
    match state.hand.iter().find(|c| is_legal_play(c, top)) {
        Some(card) => ClientMessage::PlayCard {
            card_id: card.id,
            chosen_color: card.is_wild().then_some(Color::Red),
        },
        None => ClientMessage::DrawCard,
    }
}

/// Play the game forward one move at a time until `stop` holds for the
/// shared view, refreshing every client's state after each move.
pub async fn play_until(
    clients: &mut [TestClient],
    states: &mut [ClientGameState],
    stop: impl Fn(&ClientGameState) -> bool,
) {
    for _ in 0..500 {
        if stop(&states[0]) {
            return;
        }
        let current = states[0].current_player_index;
        let intent = next_move(&states[current]);
        clients[current].send(intent);
        for (client, state) in clients.iter_mut().zip(states.iter_mut()) {
            *state = client.state_update().await;
        }
    }
    panic!("game never reached the expected state");
}
