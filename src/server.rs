//! The room server: one actor task that owns every room.
//!
//! [`RoomServer::start`] spawns a background task holding the
//! [`RoomRegistry`] and the connection table. Connections talk to it through
//! [`ConnectionHandle`]s over an unbounded command channel; the actor handles
//! one command to completion before looking at the next, so no two intents
//! ever mutate a room concurrently.
//!
//! Outbound messages go to a bounded per-connection channel. A slow reader
//! loses messages (with a warning) rather than stalling every room.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::action::GameAction;
use crate::card::{CardId, Color};
use crate::clock::now_millis;
use crate::config::ServerConfig;
use crate::engine::PlayerId;
use crate::error::{Result, RoomError, ServerError};
use crate::error_codes::ErrorCode;
use crate::projection::ClientGameState;
use crate::protocol::{ClientMessage, Intent, ServerMessage};
use crate::room::{DisconnectOutcome, LeaveOutcome, RoomRegistry};

/// Transient identity of one client connection.
pub type ConnectionId = Uuid;

type IntentResult = std::result::Result<(), RoomError>;

enum Command {
    Connect {
        id: ConnectionId,
        outbound: mpsc::Sender<ServerMessage>,
    },
    Message {
        id: ConnectionId,
        msg: ClientMessage,
    },
    Disconnect {
        id: ConnectionId,
    },
    ExpireSeat {
        code: String,
        player_id: PlayerId,
    },
    RoomCount {
        reply: oneshot::Sender<usize>,
    },
}

// ── Public handles ──────────────────────────────────────────────────

/// Handle to the running room actor.
///
/// Dropping the handle aborts the actor; call [`shutdown`](Self::shutdown)
/// for an orderly stop.
pub struct RoomServer {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
    event_channel_capacity: usize,
}

impl RoomServer {
    /// Spawn the actor. Must be called inside a tokio runtime.
    pub fn start(config: ServerConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let actor = Actor {
            registry: RoomRegistry::new(config.clone()),
            sessions: HashMap::new(),
            connections: HashMap::new(),
            timers: HashMap::new(),
            reconnect_grace: config.reconnect_grace,
            cmd_tx: cmd_tx.downgrade(),
        };
        let task = tokio::spawn(actor_loop(actor, cmd_rx, shutdown_rx));
        info!("room server started");

        Self {
            cmd_tx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
            event_channel_capacity: config.event_channel_capacity.max(1),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the handle used to submit client messages and the receiver of
    /// everything the server sends to this connection.
    ///
    /// # Errors
    ///
    /// [`ServerError::ServerClosed`] if the actor has stopped.
    pub fn connect(&self) -> Result<(ConnectionHandle, mpsc::Receiver<ServerMessage>)> {
        let id = Uuid::new_v4();
        let (outbound, rx) = mpsc::channel(self.event_channel_capacity);
        self.cmd_tx
            .send(Command::Connect { id, outbound })
            .map_err(|_| ServerError::ServerClosed)?;

        let handle = ConnectionHandle {
            id,
            cmd_tx: self.cmd_tx.clone(),
        };
        Ok((handle, rx))
    }

    /// Number of live rooms.
    ///
    /// # Errors
    ///
    /// [`ServerError::ServerClosed`] if the actor has stopped.
    pub async fn room_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RoomCount { reply })
            .map_err(|_| ServerError::ServerClosed)?;
        rx.await.map_err(|_| ServerError::ServerClosed)
    }

    /// Returns `true` until the actor task has exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the actor, closing every connection's outbound channel.
    pub async fn shutdown(&mut self) {
        debug!("RoomServer: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("room actor terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("room actor did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("room actor aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RoomServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomServer")
            .field("running", &self.is_running())
            .field("event_channel_capacity", &self.event_channel_capacity)
            .finish()
    }
}

impl Drop for RoomServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One client's way in. Dropping it disconnects the client.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a client message for the actor.
    ///
    /// # Errors
    ///
    /// [`ServerError::ServerClosed`] if the actor has stopped.
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(Command::Message { id: self.id, msg })
            .map_err(|_| ServerError::ServerClosed)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Disconnect { id: self.id });
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect { id, .. } => write!(f, "Connect({id})"),
            Self::Message { id, msg } => write!(f, "Message({id}, {:?})", msg.intent()),
            Self::Disconnect { id } => write!(f, "Disconnect({id})"),
            Self::ExpireSeat { code, player_id } => write!(f, "ExpireSeat({code}, {player_id})"),
            Self::RoomCount { .. } => f.write_str("RoomCount"),
        }
    }
}

// ── Actor ───────────────────────────────────────────────────────────

struct Session {
    outbound: mpsc::Sender<ServerMessage>,
    player: Option<PlayerId>,
    in_voice: bool,
}

struct Actor {
    registry: RoomRegistry,
    sessions: HashMap<ConnectionId, Session>,
    /// Stable player id to the connection currently speaking for it.
    connections: HashMap<PlayerId, ConnectionId>,
    /// Pending grace-period expiries.
    timers: HashMap<PlayerId, JoinHandle<()>>,
    reconnect_grace: Duration,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
}

async fn actor_loop(
    mut actor: Actor,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("room actor started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => actor.handle(cmd),
                    None => {
                        debug!("command channel closed, stopping room actor");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                break;
            }
        }
    }

    for (_, timer) in actor.timers.drain() {
        timer.abort();
    }
    info!(rooms = actor.registry.room_count(), "room actor exited");
}

impl Actor {
    fn handle(&mut self, cmd: Command) {
        trace!(?cmd, "room actor command");
        match cmd {
            Command::Connect { id, outbound } => {
                debug!(conn = %id, "connection opened");
                self.sessions.insert(
                    id,
                    Session {
                        outbound,
                        player: None,
                        in_voice: false,
                    },
                );
            }
            Command::Message { id, msg } => self.on_message(id, msg),
            Command::Disconnect { id } => self.on_disconnect(id),
            Command::ExpireSeat { code, player_id } => self.on_expire(&code, player_id),
            Command::RoomCount { reply } => {
                let _ = reply.send(self.registry.room_count());
            }
        }
    }

    fn on_message(&mut self, conn: ConnectionId, msg: ClientMessage) {
        let Some(intent) = msg.intent() else {
            self.on_side_channel(conn, msg);
            return;
        };

        let result = match msg {
            ClientMessage::CreateRoom { player_name } => self.create_room(conn, &player_name),
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(conn, &room_code, &player_name),
            ClientMessage::Reconnect {
                room_code,
                player_name,
            } => self.reconnect(conn, &room_code, &player_name),
            ClientMessage::LeaveRoom => self.leave_room(conn),
            ClientMessage::StartGame => self.start_game(conn),
            ClientMessage::PlayCard {
                card_id,
                chosen_color,
            } => self.play_card(conn, card_id, chosen_color),
            ClientMessage::DrawCard => self.draw_card(conn),
            ClientMessage::CallUno => self.call_uno(conn),
            ClientMessage::CatchUno { target_id } => self.catch_uno(conn, target_id),
            ClientMessage::VoiceJoin
            | ClientMessage::VoiceLeave
            | ClientMessage::VoiceSignal { .. }
            | ClientMessage::Ping => Ok(()),
        };

        if let Err(err) = result {
            debug!(conn = %conn, ?intent, error = %err, "intent rejected");
            self.send_to(conn, ServerMessage::rejected(intent, err.code(), &err));
        }
    }

    // ── Room intents ────────────────────────────────────────────────

    fn create_room(&mut self, conn: ConnectionId, name: &str) -> IntentResult {
        let player_id = self.registry.new_player_id();
        let room = self.registry.create_room(player_id, name, now_millis())?.snapshot();

        self.leave_previous(conn);
        self.bind(conn, player_id);
        self.send_to(
            conn,
            ServerMessage::RoomJoined {
                room,
                player_id,
                reconnected: false,
            },
        );
        Ok(())
    }

    fn join_room(
        &mut self,
        conn: ConnectionId,
        code: &str,
        name: &str,
    ) -> IntentResult {
        let player_id = self.registry.new_player_id();
        let room = self.registry.join_room(code, player_id, name)?.snapshot();
        let joined = room.players.iter().find(|p| p.id == player_id).cloned();

        self.leave_previous(conn);
        self.bind(conn, player_id);
        let code = room.code.clone();
        self.send_to(
            conn,
            ServerMessage::RoomJoined {
                room: room.clone(),
                player_id,
                reconnected: false,
            },
        );
        if let Some(player) = joined {
            self.broadcast_except(&code, player_id, &ServerMessage::PlayerJoined { player });
        }
        self.broadcast_except(&code, player_id, &ServerMessage::RoomUpdated { room });
        Ok(())
    }

    fn reconnect(
        &mut self,
        conn: ConnectionId,
        code: &str,
        name: &str,
    ) -> IntentResult {
        let back = self.registry.reconnect(code, name)?;
        if let Some(timer) = self.timers.remove(&back.player_id) {
            timer.abort();
        }

        self.leave_previous(conn);
        self.bind(conn, back.player_id);

        let Some(room) = self.registry.room(&back.code) else {
            return Ok(());
        };
        let snapshot = room.snapshot();
        let state = room
            .engine()
            .map(|engine| Box::new(engine.client_state(back.player_id)));

        self.send_to(
            conn,
            ServerMessage::RoomJoined {
                room: snapshot.clone(),
                player_id: back.player_id,
                reconnected: true,
            },
        );
        if let Some(state) = state {
            self.send_to(conn, ServerMessage::GameStateUpdated(state));
        }
        self.broadcast_except(
            &back.code,
            back.player_id,
            &ServerMessage::PlayerReconnected {
                player_id: back.player_id,
            },
        );
        self.broadcast_except(
            &back.code,
            back.player_id,
            &ServerMessage::RoomUpdated { room: snapshot },
        );
        self.send_states(&back.code, ServerMessage::GameStateUpdated);
        Ok(())
    }

    fn leave_room(&mut self, conn: ConnectionId) -> IntentResult {
        let player_id = self.player_of(conn)?;
        self.voice_leave(conn);
        let outcome = self
            .registry
            .leave_room(player_id, now_millis())
            .ok_or(RoomError::NotInRoom)?;

        self.unbind(conn);
        self.send_to(
            conn,
            ServerMessage::IntentAccepted {
                intent: Intent::LeaveRoom,
            },
        );
        self.publish_departure(outcome);
        Ok(())
    }

    fn start_game(&mut self, conn: ConnectionId) -> IntentResult {
        let player_id = self.player_of(conn)?;
        let code = self.registry.start_game(player_id)?.code().to_string();

        self.send_to(
            conn,
            ServerMessage::IntentAccepted {
                intent: Intent::StartGame,
            },
        );
        self.send_states(&code, ServerMessage::GameStarted);
        self.broadcast_room(&code);
        Ok(())
    }

    // ── Game intents ────────────────────────────────────────────────

    fn play_card(
        &mut self,
        conn: ConnectionId,
        card_id: CardId,
        chosen_color: Option<Color>,
    ) -> IntentResult {
        let player_id = self.player_of(conn)?;
        let now = now_millis();
        let actions = self
            .registry
            .with_engine(player_id, |engine| {
                engine.play_card(player_id, card_id, chosen_color, now)
            })?;

        self.accept(conn, Intent::PlayCard);
        self.publish_for(player_id, actions);
        Ok(())
    }

    fn draw_card(&mut self, conn: ConnectionId) -> IntentResult {
        let player_id = self.player_of(conn)?;
        let drawn = self
            .registry
            .with_engine(player_id, |engine| engine.draw_card(player_id))?;
        debug!(player = %player_id, card = %drawn.card, "card drawn");

        self.accept(conn, Intent::DrawCard);
        self.publish_for(player_id, drawn.actions);

        let hand = self
            .registry
            .room_of(player_id)
            .and_then(|room| room.engine())
            .and_then(|engine| engine.seat(player_id))
            .map(|seat| seat.hand().to_vec())
            .unwrap_or_default();
        self.send_to(conn, ServerMessage::HandUpdated { hand });
        Ok(())
    }

    fn call_uno(&mut self, conn: ConnectionId) -> IntentResult {
        let player_id = self.player_of(conn)?;
        let actions = self
            .registry
            .with_engine(player_id, |engine| engine.call_uno(player_id))?;

        self.accept(conn, Intent::CallUno);
        let name = self.name_of(player_id);
        self.publish_for(player_id, actions);
        self.toast(player_id, format!("{name} called UNO!"));
        Ok(())
    }

    fn catch_uno(
        &mut self,
        conn: ConnectionId,
        target_id: PlayerId,
    ) -> IntentResult {
        let player_id = self.player_of(conn)?;
        let now = now_millis();
        let actions = self
            .registry
            .with_engine(player_id, |engine| engine.catch_uno(player_id, target_id, now))?;

        self.accept(conn, Intent::CatchUno);
        let catcher = self.name_of(player_id);
        let target = self.name_of(target_id);
        self.publish_for(player_id, actions);
        self.toast(
            player_id,
            format!("{catcher} caught {target} not calling UNO! +2 cards"),
        );
        Ok(())
    }

    // ── Heartbeat and voice relay ───────────────────────────────────

    fn on_side_channel(&mut self, conn: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Ping => self.send_to(conn, ServerMessage::Pong),
            ClientMessage::VoiceJoin => self.voice_join(conn),
            ClientMessage::VoiceLeave => self.voice_leave(conn),
            ClientMessage::VoiceSignal { target_id, signal } => {
                self.voice_signal(conn, target_id, signal);
            }
            other => debug!(conn = %conn, ?other, "unexpected side-channel message"),
        }
    }

    fn voice_join(&mut self, conn: ConnectionId) {
        let Some((player_id, code)) = self.membership(conn) else {
            self.send_error(conn, ErrorCode::NotInRoom);
            return;
        };
        if let Some(session) = self.sessions.get_mut(&conn) {
            session.in_voice = true;
        }
        self.broadcast_except(&code, player_id, &ServerMessage::VoicePeerJoined { peer_id: player_id });
    }

    fn voice_leave(&mut self, conn: ConnectionId) {
        let was_in_voice = self
            .sessions
            .get_mut(&conn)
            .map(|s| std::mem::replace(&mut s.in_voice, false))
            .unwrap_or(false);
        if !was_in_voice {
            return;
        }
        if let Some((player_id, code)) = self.membership(conn) {
            self.broadcast_except(&code, player_id, &ServerMessage::VoicePeerLeft { peer_id: player_id });
        }
    }

    fn voice_signal(&self, conn: ConnectionId, target_id: PlayerId, signal: serde_json::Value) {
        let Some((player_id, code)) = self.membership(conn) else {
            self.send_error(conn, ErrorCode::NotInRoom);
            return;
        };
        let same_room = self
            .registry
            .room_of(target_id)
            .is_some_and(|room| room.code() == code);
        if !same_room {
            self.send_error(conn, ErrorCode::PlayerNotFound);
            return;
        }
        self.send_to_player(
            target_id,
            ServerMessage::VoiceSignal {
                from_id: player_id,
                signal,
            },
        );
    }

    // ── Connection lifecycle ────────────────────────────────────────

    fn on_disconnect(&mut self, conn: ConnectionId) {
        self.voice_leave(conn);
        let Some(session) = self.sessions.remove(&conn) else {
            return;
        };
        debug!(conn = %conn, "connection closed");
        let Some(player_id) = session.player else {
            return;
        };
        if self.connections.get(&player_id) == Some(&conn) {
            self.connections.remove(&player_id);
        }

        match self.registry.disconnect(player_id, now_millis()) {
            Some(DisconnectOutcome::Left(outcome)) => self.publish_departure(outcome),
            Some(DisconnectOutcome::Suspended {
                code,
                player_id,
                actions,
            }) => {
                self.broadcast(&code, &ServerMessage::PlayerDisconnected { player_id });
                self.schedule_expiry(code.clone(), player_id);
                if actions.is_empty() {
                    self.send_states(&code, ServerMessage::GameStateUpdated);
                    self.broadcast_room(&code);
                } else {
                    self.publish_game(&code, actions);
                }
            }
            None => {}
        }
    }

    fn schedule_expiry(&mut self, code: String, player_id: PlayerId) {
        let grace = self.reconnect_grace;
        let weak = self.cmd_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(Command::ExpireSeat { code, player_id });
            }
        });
        if let Some(previous) = self.timers.insert(player_id, timer) {
            previous.abort();
        }
    }

    fn on_expire(&mut self, code: &str, player_id: PlayerId) {
        self.timers.remove(&player_id);
        if let Some(outcome) = self.registry.expire_seat(code, player_id) {
            self.publish_departure(outcome);
        }
    }

    // ── Publishing ──────────────────────────────────────────────────

    /// Publish to the room `member` belongs to.
    fn publish_for(&self, member: PlayerId, actions: Vec<GameAction>) {
        if let Some(code) = self.registry.room_of(member).map(|r| r.code().to_string()) {
            self.publish_game(&code, actions);
        }
    }

    /// Action log, tailored states, and the game over if the log ends one.
    fn publish_game(&self, code: &str, actions: Vec<GameAction>) {
        let winner = actions.iter().find_map(|action| match action {
            GameAction::GameOver { winner_id } => Some(*winner_id),
            _ => None,
        });

        for action in actions {
            debug!(room = %code, player = %action.subject(), ?action, "game action");
            self.broadcast(code, &ServerMessage::GameAction(action));
        }
        self.send_states(code, ServerMessage::GameStateUpdated);

        if let Some(winner_id) = winner {
            info!(room = %code, winner = %winner_id, "game over");
            self.broadcast(code, &ServerMessage::GameOver { winner_id });
            self.broadcast_room(code);
        }
    }

    fn publish_departure(&self, outcome: LeaveOutcome) {
        if outcome.room_deleted {
            return;
        }
        let code = &outcome.code;
        self.broadcast(
            code,
            &ServerMessage::PlayerLeft {
                player_id: outcome.player_id,
            },
        );
        if let Some(host_id) = outcome.new_host {
            self.broadcast(code, &ServerMessage::HostChanged { host_id });
        }

        if outcome.actions.is_empty() {
            self.broadcast_room(code);
            return;
        }
        self.publish_game(code, outcome.actions);
    }

    /// One tailored state per connected member.
    fn send_states(&self, code: &str, wrap: fn(Box<ClientGameState>) -> ServerMessage) {
        let Some(room) = self.registry.room(code) else {
            return;
        };
        let Some(engine) = room.engine() else {
            return;
        };
        for player in room.players() {
            if player.is_connected {
                self.send_to_player(player.id, wrap(Box::new(engine.client_state(player.id))));
            }
        }
    }

    fn broadcast_room(&self, code: &str) {
        if let Some(room) = self.registry.room(code) {
            self.broadcast(code, &ServerMessage::RoomUpdated { room: room.snapshot() });
        }
    }

    fn toast(&self, member: PlayerId, message: String) {
        if let Some(room) = self.registry.room_of(member) {
            self.broadcast(room.code(), &ServerMessage::Toast { message });
        }
    }

    fn broadcast(&self, code: &str, msg: &ServerMessage) {
        self.broadcast_filtered(code, None, msg);
    }

    fn broadcast_except(&self, code: &str, except: PlayerId, msg: &ServerMessage) {
        self.broadcast_filtered(code, Some(except), msg);
    }

    fn broadcast_filtered(&self, code: &str, except: Option<PlayerId>, msg: &ServerMessage) {
        let Some(room) = self.registry.room(code) else {
            return;
        };
        for player in room.players() {
            if Some(player.id) != except {
                self.send_to_player(player.id, msg.clone());
            }
        }
    }

    fn send_to_player(&self, player_id: PlayerId, msg: ServerMessage) {
        if let Some(conn) = self.connections.get(&player_id) {
            self.send_to(*conn, msg);
        }
    }

    /// Deliver without blocking. A full channel drops the message.
    fn send_to(&self, conn: ConnectionId, msg: ServerMessage) {
        let Some(session) = self.sessions.get(&conn) else {
            return;
        };
        match session.outbound.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    conn = %conn,
                    "outbound channel full, dropping message: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn = %conn, "outbound channel closed, receiver dropped");
            }
        }
    }

    fn send_error(&self, conn: ConnectionId, code: ErrorCode) {
        self.send_to(
            conn,
            ServerMessage::Error {
                message: code.description().to_string(),
                error_code: code,
            },
        );
    }

    fn accept(&self, conn: ConnectionId, intent: Intent) {
        self.send_to(conn, ServerMessage::IntentAccepted { intent });
    }

    // ── Session bookkeeping ─────────────────────────────────────────

    fn player_of(&self, conn: ConnectionId) -> std::result::Result<PlayerId, RoomError> {
        self.sessions
            .get(&conn)
            .and_then(|s| s.player)
            .ok_or(RoomError::NotInRoom)
    }

    fn membership(&self, conn: ConnectionId) -> Option<(PlayerId, String)> {
        let player_id = self.sessions.get(&conn)?.player?;
        let code = self.registry.room_of(player_id)?.code().to_string();
        Some((player_id, code))
    }

    fn name_of(&self, player_id: PlayerId) -> String {
        self.registry
            .room_of(player_id)
            .and_then(|room| room.name_of(player_id))
            .unwrap_or("someone")
            .to_string()
    }

    fn bind(&mut self, conn: ConnectionId, player_id: PlayerId) {
        if let Some(session) = self.sessions.get_mut(&conn) {
            session.player = Some(player_id);
        }
        self.connections.insert(player_id, conn);
    }

    fn unbind(&mut self, conn: ConnectionId) {
        let player = self.sessions.get_mut(&conn).and_then(|s| s.player.take());
        if let Some(player_id) = player {
            if self.connections.get(&player_id) == Some(&conn) {
                self.connections.remove(&player_id);
            }
        }
    }

    /// A connection switching rooms leaves the old one first.
    fn leave_previous(&mut self, conn: ConnectionId) {
        let Ok(previous) = self.player_of(conn) else {
            return;
        };
        self.voice_leave(conn);
        let outcome = self.registry.leave_room(previous, now_millis());
        self.unbind(conn);
        if let Some(outcome) = outcome {
            self.publish_departure(outcome);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    async fn next(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("outbound channel closed")
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let server = RoomServer::start(ServerConfig::new().with_seed(1));
        let (conn, mut rx) = server.connect().unwrap();
        conn.send(ClientMessage::Ping).unwrap();
        assert_eq!(next(&mut rx).await, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn intents_outside_a_room_are_rejected() {
        let server = RoomServer::start(ServerConfig::new().with_seed(1));
        let (conn, mut rx) = server.connect().unwrap();
        conn.send(ClientMessage::DrawCard).unwrap();
        match next(&mut rx).await {
            ServerMessage::IntentRejected {
                intent, error_code, ..
            } => {
                assert_eq!(intent, Intent::DrawCard);
                assert_eq!(error_code, ErrorCode::NotInRoom);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_the_creator_deletes_a_waiting_room() {
        let server = RoomServer::start(ServerConfig::new().with_seed(1));
        let (conn, mut rx) = server.connect().unwrap();
        conn.send(ClientMessage::CreateRoom {
            player_name: "Ann".into(),
        })
        .unwrap();
        assert!(matches!(next(&mut rx).await, ServerMessage::RoomJoined { .. }));
        assert_eq!(server.room_count().await.unwrap(), 1);

        drop(conn);
        assert_eq!(server.room_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_outbound_channels() {
        let mut server = RoomServer::start(ServerConfig::new().with_seed(1));
        let (conn, mut rx) = server.connect().unwrap();
        server.shutdown().await;
        assert!(!server.is_running());
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            conn.send(ClientMessage::Ping),
            Err(ServerError::ServerClosed)
        ));
        assert!(matches!(
            server.room_count().await,
            Err(ServerError::ServerClosed)
        ));
    }

    #[tokio::test]
    async fn tiny_outbound_channel_drops_instead_of_blocking() {
        let server = RoomServer::start(
            ServerConfig::new()
                .with_seed(1)
                .with_event_channel_capacity(1),
        );
        let (conn, mut rx) = server.connect().unwrap();
        for _ in 0..10 {
            conn.send(ClientMessage::Ping).unwrap();
        }
        // The actor keeps serving even though nine pongs were dropped.
        assert_eq!(server.room_count().await.unwrap(), 0);
        assert_eq!(next(&mut rx).await, ServerMessage::Pong);
    }
}
