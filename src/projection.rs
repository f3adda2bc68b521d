//! Per-player views of a game.
//!
//! Everything a client receives about a running game goes through
//! [`project`]. Other players' hands are reduced to card counts.

use serde::{Deserialize, Serialize};

use crate::action::GameAction;
use crate::card::Card;
use crate::clock::Timestamp;
use crate::engine::{Direction, GameStatus, PlayerId, Seat, TurnEngine};

/// How many cards of the discard pile are visible.
pub const VISIBLE_DISCARDS: usize = 3;

/// What everyone may know about a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub card_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<Timestamp>,
}

impl From<&Seat> for PublicPlayer {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id(),
            name: seat.name().to_string(),
            is_host: seat.is_host(),
            is_connected: seat.is_connected(),
            card_count: seat.card_count(),
            disconnected_at: seat.disconnected_at(),
        }
    }
}

/// One player's view of the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientGameState {
    pub current_player_index: usize,
    pub direction: Direction,
    /// Oldest first; the last entry is the top card.
    pub discard_pile: Vec<Card>,
    pub draw_pile_count: usize,
    pub players: Vec<PublicPlayer>,
    pub status: GameStatus,
    pub winner_id: Option<PlayerId>,
    pub last_action: Option<GameAction>,
    /// The player currently owing an UNO call, if any.
    pub must_call_uno: Option<PlayerId>,
    /// The viewer's own hand. Empty for a non-member.
    pub hand: Vec<Card>,
    pub my_index: Option<usize>,
}

/// Build the view for `player_id`.
///
/// An id with no seat still gets the public part of the state.
pub fn project(engine: &TurnEngine, player_id: PlayerId) -> ClientGameState {
    let discards = engine.discard_pile();
    let visible = discards.len().saturating_sub(VISIBLE_DISCARDS);
    let my_index = engine.seats().iter().position(|s| s.id() == player_id);

    ClientGameState {
        current_player_index: engine.current_index(),
        direction: engine.direction(),
        discard_pile: discards.iter().skip(visible).cloned().collect(),
        draw_pile_count: engine.draw_pile_len(),
        players: engine.seats().iter().map(PublicPlayer::from).collect(),
        status: engine.status(),
        winner_id: engine.winner(),
        last_action: engine.last_action().cloned(),
        must_call_uno: engine.obligation().map(|o| o.player_id),
        hand: engine
            .seat(player_id)
            .map(|s| s.hand().to_vec())
            .unwrap_or_default(),
        my_index,
    }
}
