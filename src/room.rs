//! Rooms and the registry that owns them.
//!
//! [`RoomRegistry`] is the single owner of every live [`Room`] plus the
//! player-to-room reverse index. Every insert and removal goes through it so
//! the index never points at a deleted room.

use std::collections::HashMap;

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Builder;

use crate::action::GameAction;
use crate::clock::Timestamp;
use crate::config::{ServerConfig, ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH};
use crate::engine::{GameStatus, PlayerId, Seat, SeatSpec, TurnEngine};
use crate::error::{GameError, RoomError};
use crate::projection::PublicPlayer;

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPlayer {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub disconnected_at: Option<Timestamp>,
}

impl RoomPlayer {
    fn new(id: PlayerId, name: String, is_host: bool) -> Self {
        Self {
            id,
            name,
            is_host,
            is_connected: true,
            disconnected_at: None,
        }
    }
}

/// Public description of a room, sent on join and on every roster change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub players: Vec<PublicPlayer>,
    pub status: RoomStatus,
    pub host_id: PlayerId,
    pub max_players: usize,
    pub created_at: Timestamp,
}

/// A joinable session.
///
/// The engine is present exactly when the status is not `Waiting`.
#[derive(Debug)]
pub struct Room {
    code: String,
    players: Vec<RoomPlayer>,
    status: RoomStatus,
    host_id: PlayerId,
    max_players: usize,
    created_at: Timestamp,
    engine: Option<TurnEngine>,
    /// Reconnection key: display name to stable id.
    player_names: HashMap<String, PlayerId>,
}

impl Room {
    fn new(code: String, host: RoomPlayer, max_players: usize, created_at: Timestamp) -> Self {
        let mut player_names = HashMap::new();
        player_names.insert(host.name.clone(), host.id);
        Self {
            code,
            host_id: host.id,
            players: vec![host],
            status: RoomStatus::Waiting,
            max_players,
            created_at,
            engine: None,
            player_names,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn players(&self) -> &[RoomPlayer] {
        &self.players
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn host_id(&self) -> PlayerId {
        self.host_id
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn engine(&self) -> Option<&TurnEngine> {
        self.engine.as_ref()
    }

    /// Display name of a member, for log lines and toasts.
    pub fn name_of(&self, player_id: PlayerId) -> Option<&str> {
        self.player(player_id).map(|p| p.name.as_str())
    }

    /// Snapshot with card counts taken from the engine, when there is one.
    pub fn snapshot(&self) -> RoomSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| PublicPlayer {
                id: p.id,
                name: p.name.clone(),
                is_host: p.is_host,
                is_connected: p.is_connected,
                card_count: self
                    .engine
                    .as_ref()
                    .and_then(|e| e.seat(p.id))
                    .map_or(0, Seat::card_count),
                disconnected_at: p.disconnected_at,
            })
            .collect();

        RoomSnapshot {
            code: self.code.clone(),
            players,
            status: self.status,
            host_id: self.host_id,
            max_players: self.max_players,
            created_at: self.created_at,
        }
    }

    fn sync_status(&mut self) {
        if self.status == RoomStatus::Playing
            && self
                .engine
                .as_ref()
                .is_some_and(|e| e.status() == GameStatus::Finished)
        {
            self.status = RoomStatus::Finished;
            info!(room = %self.code, "game finished");
        }
    }

    fn transfer_host(&mut self) -> Option<PlayerId> {
        let next = self
            .players
            .iter()
            .find(|p| p.is_connected)
            .or_else(|| self.players.first())?
            .id;
        self.host_id = next;
        for player in &mut self.players {
            player.is_host = player.id == next;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.set_host(next);
        }
        Some(next)
    }
}

/// Result of a player leaving a room, by choice or by grace expiry.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub code: String,
    pub player_id: PlayerId,
    /// Set when the departing player was host and someone remains.
    pub new_host: Option<PlayerId>,
    pub room_deleted: bool,
    /// Game log entries caused by the departure, e.g. a forced win.
    pub actions: Vec<GameAction>,
}

/// Result of a dropped connection.
#[derive(Debug, Clone)]
pub enum DisconnectOutcome {
    /// No game to preserve; the player was removed outright.
    Left(LeaveOutcome),
    /// The seat is held for the grace period.
    Suspended {
        code: String,
        player_id: PlayerId,
        actions: Vec<GameAction>,
    },
}

/// Result of a successful reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnected {
    pub code: String,
    pub player_id: PlayerId,
}

/// Owner of every live room.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    player_rooms: HashMap<PlayerId, String>,
    config: ServerConfig,
    rng: ChaCha8Rng,
}

impl RoomRegistry {
    pub fn new(config: ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            rng,
        }
    }

    /// A fresh player id, drawn from the registry's random stream.
    pub fn new_player_id(&mut self) -> PlayerId {
        Builder::from_random_bytes(self.rng.gen()).into_uuid()
    }

    /// A fresh code not used by any live room.
    pub fn generate_code(&mut self) -> String {
        let dist = Uniform::from(0..ROOM_CODE_ALPHABET.len());
        loop {
            let code: String = (0..ROOM_CODE_LENGTH)
                .filter_map(|_| ROOM_CODE_ALPHABET.get(dist.sample(&mut self.rng)))
                .map(|&b| char::from(b))
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Open a room with `player_id` as sole member and host.
    ///
    /// # Errors
    ///
    /// `NameRequired` for a blank name.
    pub fn create_room(
        &mut self,
        player_id: PlayerId,
        name: &str,
        now: Timestamp,
    ) -> Result<&Room, RoomError> {
        let name = normalize_name(name)?;
        let code = self.generate_code();
        let host = RoomPlayer::new(player_id, name, true);
        let room = Room::new(code.clone(), host, self.config.max_players, now);

        info!(room = %code, player = %player_id, "room created");
        self.player_rooms.insert(player_id, code.clone());
        Ok(&*self.rooms.entry(code).or_insert(room))
    }

    /// Add `player_id` to the room with `code`.
    ///
    /// The code is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// `RoomCodeRequired`, `NameRequired`, `RoomNotFound`,
    /// `GameAlreadyInProgress`, `RoomFull`, or `NameTaken`.
    pub fn join_room(
        &mut self,
        code: &str,
        player_id: PlayerId,
        name: &str,
    ) -> Result<&Room, RoomError> {
        let code = normalize_code(code)?;
        let name = normalize_name(name)?;
        let room = self.rooms.get_mut(&code).ok_or(RoomError::RoomNotFound)?;

        if room.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyInProgress);
        }
        if room.players.len() >= room.max_players {
            return Err(RoomError::RoomFull);
        }
        if room.players.iter().any(|p| p.name == name) {
            return Err(RoomError::NameTaken);
        }

        room.player_names.insert(name.clone(), player_id);
        room.players.push(RoomPlayer::new(player_id, name, false));
        self.player_rooms.insert(player_id, code.clone());
        debug!(room = %code, player = %player_id, "player joined");

        self.rooms.get(&code).ok_or(RoomError::RoomNotFound)
    }

    /// Remove `player_id` from their room. `None` if they are in no room.
    ///
    /// Whenever a game exists the seat is also disconnected in the engine.
    /// During play that moves the turn on, and a lone remaining player wins.
    pub fn leave_room(&mut self, player_id: PlayerId, now: Timestamp) -> Option<LeaveOutcome> {
        let code = self.player_rooms.get(&player_id)?.clone();
        let mut actions = Vec::new();

        if let Some(room) = self.rooms.get_mut(&code) {
            if let Some(engine) = room.engine.as_mut() {
                if engine.seat(player_id).is_some_and(Seat::is_connected) {
                    actions = engine.disconnect_player(player_id, now).unwrap_or_default();
                }
            }
            room.sync_status();
        }

        let mut outcome = self.remove_player(&code, player_id)?;
        outcome.actions = actions;
        Some(outcome)
    }

    /// Start the game in the host's room.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost`, `GameAlreadyStarted`, or `NotEnoughPlayers`.
    pub fn start_game(&mut self, player_id: PlayerId) -> Result<&Room, RoomError> {
        let code = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInRoom)?
            .clone();
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotInRoom)?;

        if room.host_id != player_id {
            return Err(RoomError::NotHost);
        }
        if room.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if room.players.len() < self.config.min_players {
            return Err(RoomError::NotEnoughPlayers {
                min: self.config.min_players,
            });
        }

        let seats = room
            .players
            .iter()
            .map(|p| SeatSpec::new(p.id, p.name.clone(), p.is_host));
        let rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
        let mut engine = TurnEngine::new(seats, self.config.game.clone(), rng);
        engine.start_game();

        room.engine = Some(engine);
        room.status = RoomStatus::Playing;
        info!(room = %code, players = room.players.len(), "game started");
        Ok(room)
    }

    /// Apply an engine operation on behalf of `player_id`.
    ///
    /// The room moves to `Finished` if the operation ends the game.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NoGameInProgress`, or whatever the operation returns.
    pub fn with_engine<T>(
        &mut self,
        player_id: PlayerId,
        op: impl FnOnce(&mut TurnEngine) -> Result<T, GameError>,
    ) -> Result<T, RoomError> {
        let code = self.player_rooms.get(&player_id).ok_or(RoomError::NotInRoom)?;
        let room = self.rooms.get_mut(code).ok_or(RoomError::NotInRoom)?;
        let engine = room.engine.as_mut().ok_or(RoomError::NoGameInProgress)?;
        let out = op(engine)?;
        room.sync_status();
        Ok(out)
    }

    /// Handle a dropped connection.
    ///
    /// Outside a running game this is a plain leave. During one, the seat is
    /// suspended; [`expire_seat`](Self::expire_seat) removes it later unless
    /// the player comes back.
    pub fn disconnect(&mut self, player_id: PlayerId, now: Timestamp) -> Option<DisconnectOutcome> {
        let code = self.player_rooms.get(&player_id)?.clone();
        let room = self.rooms.get_mut(&code)?;

        if room.status != RoomStatus::Playing {
            return self.leave_room(player_id, now).map(DisconnectOutcome::Left);
        }

        let player = room.players.iter_mut().find(|p| p.id == player_id)?;
        player.is_connected = false;
        player.disconnected_at = Some(now);

        let actions = match room.engine.as_mut() {
            Some(engine) => engine.disconnect_player(player_id, now).unwrap_or_default(),
            None => Vec::new(),
        };
        room.sync_status();
        info!(room = %code, player = %player_id, "seat suspended");

        Some(DisconnectOutcome::Suspended {
            code,
            player_id,
            actions,
        })
    }

    /// Re-attach a returning player to their suspended seat by name.
    ///
    /// # Errors
    ///
    /// `RoomCodeRequired`, `NameRequired`, `RoomNotFound`, or
    /// `ReconnectionFailed` if no disconnected member has that name.
    pub fn reconnect(&mut self, code: &str, name: &str) -> Result<Reconnected, RoomError> {
        let code = normalize_code(code)?;
        let name = normalize_name(name)?;
        let room = self.rooms.get_mut(&code).ok_or(RoomError::RoomNotFound)?;
        let failed = || RoomError::ReconnectionFailed { name: name.clone() };

        let player_id = *room.player_names.get(&name).ok_or_else(failed)?;
        let player = room
            .players
            .iter_mut()
            .find(|p| p.id == player_id && !p.is_connected)
            .ok_or_else(failed)?;
        player.is_connected = true;
        player.disconnected_at = None;

        if let Some(engine) = room.engine.as_mut() {
            engine.reconnect_player(player_id, player_id)?;
        }
        self.player_rooms.insert(player_id, code.clone());
        info!(room = %code, player = %player_id, "player reconnected");

        Ok(Reconnected { code, player_id })
    }

    /// Grace period over: drop the seat if it is still disconnected.
    ///
    /// `None` when the player came back, already left, or the room is gone.
    /// The engine keeps the seat and its cards; only the roster forgets it.
    pub fn expire_seat(&mut self, code: &str, player_id: PlayerId) -> Option<LeaveOutcome> {
        let room = self.rooms.get(code)?;
        if room.player(player_id)?.is_connected {
            return None;
        }
        info!(room = %code, player = %player_id, "grace period expired");
        self.remove_player(code, player_id)
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// The room `player_id` currently belongs to.
    pub fn room_of(&self, player_id: PlayerId) -> Option<&Room> {
        self.player_rooms
            .get(&player_id)
            .and_then(|code| self.rooms.get(code))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_player(&mut self, code: &str, player_id: PlayerId) -> Option<LeaveOutcome> {
        let room = self.rooms.get_mut(code)?;
        let position = room.players.iter().position(|p| p.id == player_id)?;
        room.players.remove(position);
        room.player_names.retain(|_, id| *id != player_id);
        self.player_rooms.remove(&player_id);

        if room.players.is_empty() {
            self.delete_room(code);
            return Some(LeaveOutcome {
                code: code.to_string(),
                player_id,
                new_host: None,
                room_deleted: true,
                actions: Vec::new(),
            });
        }

        let new_host = if room.host_id == player_id {
            room.transfer_host()
        } else {
            None
        };
        debug!(room = %code, player = %player_id, new_host = ?new_host, "player left");

        Some(LeaveOutcome {
            code: code.to_string(),
            player_id,
            new_host,
            room_deleted: false,
            actions: Vec::new(),
        })
    }

    fn delete_room(&mut self, code: &str) {
        self.rooms.remove(code);
        self.player_rooms.retain(|_, c| c != code);
        info!(room = %code, "room deleted");
    }
}

fn normalize_code(code: &str) -> Result<String, RoomError> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(RoomError::RoomCodeRequired);
    }
    Ok(code)
}

fn normalize_name(name: &str) -> Result<String, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::NameRequired);
    }
    Ok(name.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(ServerConfig::new().with_seed(11))
    }

    #[test]
    fn codes_use_the_alphabet_and_are_unique() {
        let mut registry = registry();
        let mut seen = HashSet::new();
        for i in 0..200 {
            let code = registry
                .create_room(Uuid::from_u128(i), "host", 0)
                .unwrap()
                .code()
                .to_string();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
            assert!(!code.contains(['I', 'O', '0', '1']));
            assert!(seen.insert(code));
        }
        assert_eq!(registry.room_count(), 200);
    }

    #[test]
    fn seeded_registries_generate_the_same_codes() {
        let mut a = registry();
        let mut b = registry();
        assert_eq!(a.generate_code(), b.generate_code());
    }

    #[test]
    fn seeded_registries_issue_the_same_player_ids() {
        let mut a = registry();
        let mut b = registry();
        let first = a.new_player_id();
        assert_eq!(first, b.new_player_id());
        assert_eq!(first.get_version_num(), 4);
        assert_ne!(first, a.new_player_id());
    }

    #[test]
    fn names_and_codes_are_normalized() {
        assert_eq!(normalize_code("  abc123 ").unwrap(), "ABC123");
        assert_eq!(normalize_code("   "), Err(RoomError::RoomCodeRequired));
        assert_eq!(normalize_name(" Ann ").unwrap(), "Ann");
        assert_eq!(normalize_name(""), Err(RoomError::NameRequired));
    }

    #[test]
    fn deleting_a_room_clears_reverse_index() {
        let mut registry = registry();
        let host = Uuid::from_u128(1);
        let code = registry.create_room(host, "host", 0).unwrap().code().to_string();
        let outcome = registry.leave_room(host, 0).unwrap();
        assert!(outcome.room_deleted);
        assert!(registry.room(&code).is_none());
        assert!(registry.room_of(host).is_none());
        assert!(registry.player_rooms.is_empty());
    }

    #[test]
    fn engine_present_iff_not_waiting() {
        let mut registry = registry();
        let host = Uuid::from_u128(1);
        let guest = Uuid::from_u128(2);
        let code = registry.create_room(host, "host", 0).unwrap().code().to_string();
        registry.join_room(&code, guest, "guest").unwrap();
        assert!(registry.room(&code).unwrap().engine().is_none());

        registry.start_game(host).unwrap();
        let room = registry.room(&code).unwrap();
        assert_eq!(room.status(), RoomStatus::Playing);
        assert!(room.engine().is_some());

        registry.leave_room(guest, 5).unwrap();
        let room = registry.room(&code).unwrap();
        assert_eq!(room.status(), RoomStatus::Finished);
        assert!(room.engine().is_some());
        assert_eq!(room.engine().unwrap().winner(), Some(host));
    }
}
