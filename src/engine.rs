//! The authoritative per-room game state machine.
//!
//! [`TurnEngine`] owns the piles, the hands, the turn pointer and the pending
//! UNO obligation. Its methods are the only way to mutate a game; each one
//! validates first and leaves the state untouched on error.
//!
//! Time-dependent operations take `now` explicitly (Unix milliseconds, see
//! [`clock`](crate::clock)). The UNO window is never enforced by a timer: a
//! pending obligation stays pending until it is called or caught.
//!
//! # Example
//!
//! ```
//! use uno_server::config::GameConfig;
//! use uno_server::engine::{SeatSpec, TurnEngine};
//! use uuid::Uuid;
//!
//! let alice = Uuid::new_v4();
//! let bob = Uuid::new_v4();
//! let mut engine = TurnEngine::with_seed(
//!     vec![SeatSpec::new(alice, "Alice", true), SeatSpec::new(bob, "Bob", false)],
//!     GameConfig::new(),
//!     42,
//! );
//! engine.start_game();
//!
//! assert_eq!(engine.seat(alice).map(|s| s.card_count()), Some(7));
//! assert!(engine.top_card().is_some_and(|c| c.is_number()));
//! assert_eq!(engine.current_player(), Some(alice));
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::action::GameAction;
use crate::card::{Card, CardId, Color};
use crate::clock::Timestamp;
use crate::config::GameConfig;
use crate::deck;
use crate::error::GameError;
use crate::projection::{self, ClientGameState};
use crate::rules;

/// Stable identity of a seated player.
pub type PlayerId = Uuid;

// ── Small state types ───────────────────────────────────────────────

/// Turn order. Serialized as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Direction {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// Seat offset of one step.
    pub fn step(self) -> isize {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
        }
    }

    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Clockwise),
            -1 => Ok(Self::CounterClockwise),
            other => Err(format!("invalid direction {other}, expected 1 or -1")),
        }
    }
}

/// Engine lifecycle. There is no waiting phase here; that belongs to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Playing,
    Finished,
}

/// A player who is down to one card and has not called UNO yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclareObligation {
    pub player_id: PlayerId,
    /// Catches are rejected before this instant.
    pub deadline: Timestamp,
}

/// Who sits at the table when the engine is created.
#[derive(Debug, Clone)]
pub struct SeatSpec {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
}

impl SeatSpec {
    pub fn new(id: PlayerId, name: impl Into<String>, is_host: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_host,
        }
    }
}

/// One player's seat, including the hidden hand.
#[derive(Debug, Clone)]
pub struct Seat {
    id: PlayerId,
    name: String,
    hand: Vec<Card>,
    is_host: bool,
    connected: bool,
    disconnected_at: Option<Timestamp>,
}

impl Seat {
    fn new(spec: SeatSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            hand: Vec::new(),
            is_host: spec.is_host,
            connected: true,
            disconnected_at: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full hand. Only the owner may ever see this.
    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn card_count(&self) -> usize {
        self.hand.len()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn disconnected_at(&self) -> Option<Timestamp> {
        self.disconnected_at
    }
}

/// Result of a successful [`TurnEngine::draw_card`].
#[derive(Debug, Clone)]
pub struct DrawnCard {
    pub card: Card,
    pub actions: Vec<GameAction>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// Authoritative state of one game.
#[derive(Debug, Clone)]
pub struct TurnEngine {
    seats: Vec<Seat>,
    /// Top of the pile is the end of the vec.
    draw_pile: Vec<Card>,
    /// Top of the pile is the end of the vec.
    discard_pile: Vec<Card>,
    current: usize,
    direction: Direction,
    status: GameStatus,
    winner: Option<PlayerId>,
    obligation: Option<DeclareObligation>,
    last_action: Option<GameAction>,
    config: GameConfig,
    rng: ChaCha8Rng,
}

impl TurnEngine {
    /// Seat the players. Call [`start_game`](Self::start_game) to deal.
    pub fn new(seats: impl IntoIterator<Item = SeatSpec>, config: GameConfig, rng: ChaCha8Rng) -> Self {
        Self {
            seats: seats.into_iter().map(Seat::new).collect(),
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
            current: 0,
            direction: Direction::Clockwise,
            status: GameStatus::Playing,
            winner: None,
            obligation: None,
            last_action: None,
            config,
            rng,
        }
    }

    /// Like [`new`](Self::new) with a deterministic shuffle stream.
    pub fn with_seed(seats: impl IntoIterator<Item = SeatSpec>, config: GameConfig, seed: u64) -> Self {
        Self::new(seats, config, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Shuffle a fresh deck, deal every seat, and flip the opening card.
    ///
    /// The opening card is always a number card: anything else flipped goes
    /// back under the draw pile.
    pub fn start_game(&mut self) {
        self.draw_pile = deck::shuffled(&mut self.rng);
        self.discard_pile.clear();
        self.status = GameStatus::Playing;
        self.winner = None;
        self.obligation = None;
        self.last_action = None;

        for index in 0..self.seats.len() {
            let hand = self.draw_cards(self.config.hand_size);
            if let Some(seat) = self.seats.get_mut(index) {
                seat.hand = hand;
            }
        }

        for _ in 0..self.draw_pile.len() {
            match self.draw_pile.pop() {
                Some(card) if card.is_number() => {
                    self.discard_pile.push(card);
                    break;
                }
                Some(card) => self.draw_pile.insert(0, card),
                None => break,
            }
        }

        self.current = 0;
        self.direction = Direction::Clockwise;
        debug!(
            seats = self.seats.len(),
            top = ?self.top_card().map(ToString::to_string),
            "game started"
        );
    }

    // ── Player intents ──────────────────────────────────────────────

    /// Play `card_id` from `player_id`'s hand.
    ///
    /// A win ends the game on the spot: the card's skip, reverse or penalty
    /// is never applied after the last card leaves the hand.
    ///
    /// # Errors
    ///
    /// `PlayerNotFound`, `NotYourTurn`, `GameNotInProgress`, `CardNotInHand`,
    /// `InvalidPlay`, or `ColorRequired` for a wild without `chosen_color`.
    pub fn play_card(
        &mut self,
        player_id: PlayerId,
        card_id: CardId,
        chosen_color: Option<Color>,
        now: Timestamp,
    ) -> Result<Vec<GameAction>, GameError> {
        let index = self.check_turn(player_id)?;
        let seat = self.seats.get(index).ok_or(GameError::PlayerNotFound)?;
        let position = seat
            .hand
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(GameError::CardNotInHand)?;
        let card = seat.hand.get(position).ok_or(GameError::CardNotInHand)?;

        let legal = self
            .discard_pile
            .last()
            .is_none_or(|top| rules::is_legal_play(card, top));
        if !legal {
            return Err(GameError::InvalidPlay);
        }
        let color = if rules::requires_color_choice(card) {
            Some(chosen_color.ok_or(GameError::ColorRequired)?)
        } else {
            None
        };

        // Validation is done; nothing below can fail.
        let mut actions = Vec::new();
        let seat = self.seats.get_mut(index).ok_or(GameError::PlayerNotFound)?;
        let mut card = seat.hand.remove(position);
        if let Some(color) = color {
            card.choose_color(color);
            actions.push(GameAction::ColorChosen { player_id, color });
        }
        let remaining = seat.hand.len();

        let penalty = rules::draw_penalty(&card);
        let skip = rules::skips_next(&card, self.seats.len());
        let reverse = rules::reverses_direction(&card);
        debug!(player = %player_id, card = %card, remaining, "card played");

        actions.push(GameAction::PlayCard {
            player_id,
            card: card.clone(),
        });
        self.discard_pile.push(card);

        self.obligation = (remaining == 1).then(|| DeclareObligation {
            player_id,
            deadline: now.saturating_add(self.config.declare_window_millis()),
        });

        if remaining == 0 {
            self.finish(player_id, &mut actions);
            return Ok(self.record(actions));
        }

        if reverse {
            self.direction = self.direction.reversed();
            actions.push(GameAction::Reverse { player_id });
        }

        let next = self.step_from(self.current, 1);
        if let Some(next_id) = self.seats.get(next).map(Seat::id) {
            if penalty > 0 {
                let drawn = self.draw_cards(penalty);
                let count = drawn.len();
                if let Some(target) = self.seats.get_mut(next) {
                    target.hand.extend(drawn);
                }
                actions.push(GameAction::DrawCard {
                    player_id: next_id,
                    count,
                });
            }
            if skip {
                actions.push(GameAction::SkipTurn { player_id: next_id });
            }
        }

        self.current = self.step_from(self.current, if skip { 2 } else { 1 });
        self.skip_disconnected();

        Ok(self.record(actions))
    }

    /// Draw one card and pass the turn.
    ///
    /// # Errors
    ///
    /// The turn guards of [`play_card`](Self::play_card), or
    /// `NoCardsAvailable` when both piles are exhausted.
    pub fn draw_card(&mut self, player_id: PlayerId) -> Result<DrawnCard, GameError> {
        let index = self.check_turn(player_id)?;
        let card = self
            .draw_cards(1)
            .into_iter()
            .next()
            .ok_or(GameError::NoCardsAvailable)?;

        if let Some(seat) = self.seats.get_mut(index) {
            seat.hand.push(card.clone());
        }
        let actions = vec![GameAction::DrawCard {
            player_id,
            count: 1,
        }];

        self.current = self.step_from(self.current, 1);
        self.skip_disconnected();

        Ok(DrawnCard {
            card,
            actions: self.record(actions),
        })
    }

    /// Announce UNO, clearing the caller's obligation.
    ///
    /// # Errors
    ///
    /// `NoObligationPending` unless the pending obligation is the caller's.
    pub fn call_uno(&mut self, player_id: PlayerId) -> Result<Vec<GameAction>, GameError> {
        match self.obligation {
            Some(obligation) if obligation.player_id == player_id => {
                self.obligation = None;
                Ok(self.record(vec![GameAction::UnoCall { player_id }]))
            }
            _ => Err(GameError::NoObligationPending),
        }
    }

    /// Catch `target_id` for not calling UNO; they draw two.
    ///
    /// The window is checked against `now` here and nowhere else.
    ///
    /// # Errors
    ///
    /// `ObligationNotPending` if the target owes nothing, `WindowStillOpen`
    /// before the deadline, `PlayerNotFound` for an unknown target.
    pub fn catch_uno(
        &mut self,
        catcher_id: PlayerId,
        target_id: PlayerId,
        now: Timestamp,
    ) -> Result<Vec<GameAction>, GameError> {
        let obligation = match self.obligation {
            Some(obligation) if obligation.player_id == target_id => obligation,
            _ => return Err(GameError::ObligationNotPending),
        };
        if now < obligation.deadline {
            return Err(GameError::WindowStillOpen);
        }
        let index = self.seat_index(target_id).ok_or(GameError::PlayerNotFound)?;

        let drawn = self.draw_cards(2);
        let count = drawn.len();
        if let Some(target) = self.seats.get_mut(index) {
            target.hand.extend(drawn);
        }
        self.obligation = None;
        debug!(catcher = %catcher_id, target = %target_id, "uno caught");

        Ok(self.record(vec![
            GameAction::UnoCatch {
                catcher_id,
                target_id,
            },
            GameAction::DrawCard {
                player_id: target_id,
                count,
            },
        ]))
    }

    // ── Connectivity ────────────────────────────────────────────────

    /// Mark a seat disconnected, moving the turn past it if needed.
    ///
    /// When one connected player remains, the game ends in their favor
    /// whatever the hand sizes; the returned log then holds the game over.
    ///
    /// # Errors
    ///
    /// `PlayerNotFound` for an unknown id.
    pub fn disconnect_player(
        &mut self,
        player_id: PlayerId,
        now: Timestamp,
    ) -> Result<Vec<GameAction>, GameError> {
        let index = self.seat_index(player_id).ok_or(GameError::PlayerNotFound)?;
        if let Some(seat) = self.seats.get_mut(index) {
            seat.connected = false;
            seat.disconnected_at = Some(now);
        }

        let mut actions = Vec::new();
        if self.status != GameStatus::Playing {
            return Ok(actions);
        }

        if index == self.current {
            self.current = self.step_from(self.current, 1);
            self.skip_disconnected();
        }

        let mut connected = self.seats.iter().filter(|s| s.connected);
        if let (Some(last), None) = (connected.next(), connected.next()) {
            let winner = last.id;
            debug!(winner = %winner, "last connected player wins");
            self.finish(winner, &mut actions);
            return Ok(self.record(actions));
        }

        Ok(actions)
    }

    /// Give a seat back to a returning player, re-keyed to `new_id`.
    ///
    /// Hand, seat position and turn state are untouched. Passing the same id
    /// twice just clears the disconnected flag.
    ///
    /// # Errors
    ///
    /// `PlayerNotFound` if `old_id` has no seat.
    pub fn reconnect_player(&mut self, old_id: PlayerId, new_id: PlayerId) -> Result<(), GameError> {
        let seat = self
            .seats
            .iter_mut()
            .find(|s| s.id == old_id)
            .ok_or(GameError::PlayerNotFound)?;
        seat.id = new_id;
        seat.connected = true;
        seat.disconnected_at = None;

        if let Some(obligation) = self.obligation.as_mut().filter(|o| o.player_id == old_id) {
            obligation.player_id = new_id;
        }
        if self.winner == Some(old_id) {
            self.winner = Some(new_id);
        }
        Ok(())
    }

    /// Move the host flag to `host_id`.
    pub(crate) fn set_host(&mut self, host_id: PlayerId) {
        for seat in &mut self.seats {
            seat.is_host = seat.id == host_id;
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// The view `player_id` is allowed to see.
    pub fn client_state(&self, player_id: PlayerId) -> ClientGameState {
        projection::project(self, player_id)
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat(&self, player_id: PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == player_id)
    }

    pub fn top_card(&self) -> Option<&Card> {
        self.discard_pile.last()
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    pub fn draw_pile_len(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.seats.get(self.current).map(Seat::id)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn obligation(&self) -> Option<DeclareObligation> {
        self.obligation
    }

    pub fn last_action(&self) -> Option<&GameAction> {
        self.last_action.as_ref()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn seat_index(&self, player_id: PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| s.id == player_id)
    }

    fn check_turn(&self, player_id: PlayerId) -> Result<usize, GameError> {
        let index = self.seat_index(player_id).ok_or(GameError::PlayerNotFound)?;
        if index != self.current {
            return Err(GameError::NotYourTurn);
        }
        if self.status != GameStatus::Playing {
            return Err(GameError::GameNotInProgress);
        }
        Ok(index)
    }

    /// Seat `steps` places away from `from` in the current direction.
    fn step_from(&self, from: usize, steps: usize) -> usize {
        let count = self.seats.len().max(1) as isize;
        let offset = self.direction.step() * steps as isize;
        (from as isize + offset).rem_euclid(count) as usize
    }

    /// Move the turn off disconnected seats, at most one lap.
    fn skip_disconnected(&mut self) {
        for _ in 0..self.seats.len() {
            match self.seats.get(self.current) {
                Some(seat) if !seat.connected => self.current = self.step_from(self.current, 1),
                _ => break,
            }
        }
    }

    /// Pop up to `count` cards, reshuffling the discard pile when the draw
    /// pile runs dry. Returns fewer cards if both piles are exhausted.
    fn draw_cards(&mut self, count: usize) -> Vec<Card> {
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            if self.draw_pile.is_empty() {
                self.reshuffle();
            }
            match self.draw_pile.pop() {
                Some(card) => drawn.push(card),
                None => break,
            }
        }
        drawn
    }

    /// Move everything under the top discard back into the draw pile.
    fn reshuffle(&mut self) {
        let Some(top) = self.discard_pile.pop() else {
            return;
        };
        if self.discard_pile.is_empty() {
            self.discard_pile.push(top);
            return;
        }

        let mut pool = std::mem::take(&mut self.discard_pile);
        for card in &mut pool {
            card.reset_chosen_color();
        }
        deck::permute(&mut pool, &mut self.rng);
        debug!(cards = pool.len(), "reshuffled discard pile");

        self.draw_pile.append(&mut pool);
        self.discard_pile.push(top);
    }

    fn finish(&mut self, winner: PlayerId, actions: &mut Vec<GameAction>) {
        self.status = GameStatus::Finished;
        self.winner = Some(winner);
        actions.push(GameAction::GameOver { winner_id: winner });
    }

    fn record(&mut self, actions: Vec<GameAction>) -> Vec<GameAction> {
        if let Some(last) = actions.last() {
            self.last_action = Some(last.clone());
        }
        actions
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
    use crate::card::{ActionKind, WildKind};
    use std::collections::HashSet;

    const NOW: Timestamp = 1_000_000;

    fn ids(n: u128) -> Vec<PlayerId> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    fn engine_with(n: u128) -> (TurnEngine, Vec<PlayerId>) {
        let players = ids(n);
        let seats = players
            .iter()
            .enumerate()
            .map(|(i, id)| SeatSpec::new(*id, format!("p{i}"), i == 0));
        let mut engine = TurnEngine::with_seed(seats, GameConfig::new(), 7);
        engine.start_game();
        (engine, players)
    }

    /// Replace seat `index`'s hand, returning the displaced cards to the draw pile.
    fn give(engine: &mut TurnEngine, index: usize, hand: Vec<Card>) {
        let old = std::mem::replace(&mut engine.seats[index].hand, hand);
        engine.draw_pile.extend(old);
    }

    fn set_top(engine: &mut TurnEngine, card: Card) {
        engine.discard_pile.push(card);
    }

    fn all_ids(engine: &TurnEngine) -> Vec<CardId> {
        let mut all: Vec<_> = engine
            .draw_pile
            .iter()
            .chain(engine.discard_pile.iter())
            .chain(engine.seats.iter().flat_map(|s| s.hand.iter()))
            .map(|c| c.id)
            .collect();
        all.sort();
        all
    }

    #[test]
    fn start_deals_and_flips_a_number() {
        let (engine, players) = engine_with(2);
        for id in &players {
            assert_eq!(engine.seat(*id).unwrap().card_count(), 7);
        }
        assert_eq!(engine.discard_pile.len(), 1);
        assert!(engine.top_card().unwrap().is_number());
        assert_eq!(engine.draw_pile_len(), 108 - 14 - 1);
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.direction(), Direction::Clockwise);
        assert_eq!(engine.status(), GameStatus::Playing);

        let unique: HashSet<_> = all_ids(&engine).into_iter().collect();
        assert_eq!(unique.len(), 108);
    }

    #[test]
    fn wrong_seat_cannot_play_and_nothing_changes() {
        let (mut engine, players) = engine_with(3);
        let card = engine.seats[1].hand[0].id;
        let before_hands: Vec<_> = engine.seats.iter().map(|s| s.hand.clone()).collect();
        let before_discard = engine.discard_pile.clone();

        let err = engine.play_card(players[1], card, None, NOW).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        let after_hands: Vec<_> = engine.seats.iter().map(|s| s.hand.clone()).collect();
        assert_eq!(before_hands, after_hands);
        assert_eq!(before_discard, engine.discard_pile);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn unknown_player_and_card_are_rejected() {
        let (mut engine, players) = engine_with(2);
        assert_eq!(
            engine.play_card(Uuid::from_u128(99), Uuid::nil(), None, NOW),
            Err(GameError::PlayerNotFound)
        );
        assert_eq!(
            engine.play_card(players[0], Uuid::nil(), None, NOW),
            Err(GameError::CardNotInHand)
        );
    }

    #[test]
    fn illegal_card_is_rejected() {
        let (mut engine, players) = engine_with(2);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let bad = Card::number(Color::Blue, 6);
        let bad_id = bad.id;
        give(&mut engine, 0, vec![bad, Card::number(Color::Blue, 7)]);
        assert_eq!(
            engine.play_card(players[0], bad_id, None, NOW),
            Err(GameError::InvalidPlay)
        );
    }

    #[test]
    fn wild_requires_color_and_records_choice() {
        let (mut engine, players) = engine_with(3);
        let wild = Card::wild(WildKind::Wild);
        let wild_id = wild.id;
        give(
            &mut engine,
            0,
            vec![wild, Card::number(Color::Red, 1), Card::number(Color::Red, 2)],
        );

        assert_eq!(
            engine.play_card(players[0], wild_id, None, NOW),
            Err(GameError::ColorRequired)
        );
        assert_eq!(engine.seats[0].hand.len(), 3);

        let actions = engine
            .play_card(players[0], wild_id, Some(Color::Green), NOW)
            .unwrap();
        assert_eq!(
            actions[0],
            GameAction::ColorChosen {
                player_id: players[0],
                color: Color::Green
            }
        );
        assert!(matches!(actions[1], GameAction::PlayCard { .. }));
        assert_eq!(engine.top_card().unwrap().effective_color(), Some(Color::Green));
        assert_eq!(engine.current_index(), 1);
    }

    #[test]
    fn number_card_passes_turn() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let card = Card::number(Color::Red, 8);
        let id = card.id;
        give(&mut engine, 0, vec![card, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(engine.current_player(), Some(players[1]));
        assert_eq!(engine.top_card().unwrap().id, id);
        assert_eq!(engine.last_action(), actions.last());
    }

    #[test]
    fn skip_jumps_one_seat() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let skip = Card::action(Color::Red, ActionKind::Skip);
        let id = skip.id;
        give(&mut engine, 0, vec![skip, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert_eq!(
            actions.last(),
            Some(&GameAction::SkipTurn {
                player_id: players[1]
            })
        );
        assert_eq!(engine.current_player(), Some(players[2]));
    }

    #[test]
    fn reverse_with_three_players_flips_direction_only() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let reverse = Card::action(Color::Red, ActionKind::Reverse);
        let id = reverse.id;
        give(&mut engine, 0, vec![reverse, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert!(actions.contains(&GameAction::Reverse {
            player_id: players[0]
        }));
        assert_eq!(engine.direction(), Direction::CounterClockwise);
        assert_eq!(engine.current_player(), Some(players[2]));
    }

    #[test]
    fn reverse_with_two_players_acts_as_skip() {
        let (mut engine, players) = engine_with(2);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let reverse = Card::action(Color::Red, ActionKind::Reverse);
        let id = reverse.id;
        give(&mut engine, 0, vec![reverse, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert!(actions.contains(&GameAction::SkipTurn {
            player_id: players[1]
        }));
        assert_eq!(engine.current_player(), Some(players[0]));
    }

    #[test]
    fn draw_two_penalizes_and_skips_next_seat() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let draw_two = Card::action(Color::Red, ActionKind::DrawTwo);
        let id = draw_two.id;
        give(&mut engine, 0, vec![draw_two, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);
        let before = engine.seats[1].hand.len();

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert_eq!(engine.seats[1].hand.len(), before + 2);
        assert_eq!(
            &actions[1..],
            &[
                GameAction::DrawCard {
                    player_id: players[1],
                    count: 2
                },
                GameAction::SkipTurn {
                    player_id: players[1]
                },
            ]
        );
        assert_eq!(engine.current_player(), Some(players[2]));
    }

    #[test]
    fn wild_draw_four_penalizes_next_in_reversed_direction() {
        let (mut engine, players) = engine_with(4);
        engine.direction = Direction::CounterClockwise;
        let wd4 = Card::wild(WildKind::WildDrawFour);
        let id = wd4.id;
        give(&mut engine, 0, vec![wd4, Card::number(Color::Blue, 1), Card::number(Color::Blue, 2)]);
        let before = engine.seats[3].hand.len();

        engine.play_card(players[0], id, Some(Color::Yellow), NOW).unwrap();
        assert_eq!(engine.seats[3].hand.len(), before + 4);
        assert_eq!(engine.current_player(), Some(players[2]));
    }

    #[test]
    fn last_card_wins_without_applying_effects() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let draw_two = Card::action(Color::Red, ActionKind::DrawTwo);
        let id = draw_two.id;
        give(&mut engine, 0, vec![draw_two]);
        let next_before = engine.seats[1].hand.len();

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert_eq!(engine.status(), GameStatus::Finished);
        assert_eq!(engine.winner(), Some(players[0]));
        assert_eq!(
            actions.last(),
            Some(&GameAction::GameOver {
                winner_id: players[0]
            })
        );
        assert_eq!(engine.seats[1].hand.len(), next_before);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.obligation().is_none());

        assert_eq!(engine.draw_card(players[0]).unwrap_err(), GameError::GameNotInProgress);
        assert_eq!(engine.draw_card(players[1]).unwrap_err(), GameError::NotYourTurn);
    }

    #[test]
    fn obligation_armed_then_caught_after_window() {
        let (mut engine, players) = engine_with(2);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let card = Card::number(Color::Red, 9);
        let id = card.id;
        give(&mut engine, 0, vec![card, Card::number(Color::Blue, 1)]);

        engine.play_card(players[0], id, None, NOW).unwrap();
        let obligation = engine.obligation().unwrap();
        assert_eq!(obligation.player_id, players[0]);
        assert_eq!(obligation.deadline, NOW + 3000);

        assert_eq!(
            engine.catch_uno(players[1], players[0], NOW + 2999),
            Err(GameError::WindowStillOpen)
        );
        assert_eq!(
            engine.catch_uno(players[0], players[1], NOW + 5000),
            Err(GameError::ObligationNotPending)
        );

        let actions = engine.catch_uno(players[1], players[0], NOW + 3000).unwrap();
        assert_eq!(engine.seats[0].hand.len(), 3);
        assert!(engine.obligation().is_none());
        assert_eq!(
            actions,
            vec![
                GameAction::UnoCatch {
                    catcher_id: players[1],
                    target_id: players[0]
                },
                GameAction::DrawCard {
                    player_id: players[0],
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn obligation_persists_past_deadline_until_resolved() {
        let (mut engine, players) = engine_with(3);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let card = Card::number(Color::Red, 9);
        let id = card.id;
        give(&mut engine, 0, vec![card, Card::number(Color::Blue, 1)]);
        engine.play_card(players[0], id, None, NOW).unwrap();

        // Nothing happens on its own; the late call still succeeds.
        let actions = engine.call_uno(players[0]).unwrap();
        assert_eq!(actions, vec![GameAction::UnoCall { player_id: players[0] }]);
        assert!(engine.obligation().is_none());
        assert_eq!(engine.call_uno(players[0]), Err(GameError::NoObligationPending));
    }

    #[test]
    fn next_play_clears_prior_obligation() {
        let (mut engine, players) = engine_with(2);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let first = Card::number(Color::Red, 9);
        let first_id = first.id;
        give(&mut engine, 0, vec![first, Card::number(Color::Blue, 1)]);
        engine.play_card(players[0], first_id, None, NOW).unwrap();
        assert!(engine.obligation().is_some());

        let second = Card::number(Color::Red, 3);
        let second_id = second.id;
        give(
            &mut engine,
            1,
            vec![second, Card::number(Color::Green, 1), Card::number(Color::Green, 2)],
        );
        engine.play_card(players[1], second_id, None, NOW).unwrap();
        assert!(engine.obligation().is_none());
    }

    #[test]
    fn draw_passes_turn_without_skip() {
        let (mut engine, players) = engine_with(3);
        let before = engine.seats[0].hand.len();
        let drawn = engine.draw_card(players[0]).unwrap();
        assert_eq!(engine.seats[0].hand.len(), before + 1);
        assert_eq!(engine.seats[0].hand.last().unwrap().id, drawn.card.id);
        assert_eq!(
            drawn.actions,
            vec![GameAction::DrawCard {
                player_id: players[0],
                count: 1
            }]
        );
        assert_eq!(engine.current_player(), Some(players[1]));
    }

    #[test]
    fn reshuffle_keeps_top_and_resets_wilds() {
        let (mut engine, players) = engine_with(2);
        let mut played_wild = Card::wild(WildKind::Wild);
        played_wild.choose_color(Color::Red);
        let wild_id = played_wild.id;
        let mut pool = std::mem::take(&mut engine.draw_pile);
        let top = engine.discard_pile.pop().unwrap();
        engine.discard_pile.append(&mut pool);
        engine.discard_pile.push(played_wild);
        engine.discard_pile.push(top.clone());
        let total = all_ids(&engine).len();

        engine.draw_card(players[0]).unwrap();
        assert_eq!(engine.discard_pile, vec![top]);
        let wild = engine
            .draw_pile
            .iter()
            .chain(engine.seats[0].hand.iter())
            .find(|c| c.id == wild_id)
            .unwrap();
        assert_eq!(wild.effective_color(), None);
        assert_eq!(all_ids(&engine).len(), total);
    }

    #[test]
    fn exhausted_piles_report_no_cards() {
        let (mut engine, players) = engine_with(2);
        engine.draw_pile.clear();
        engine.discard_pile.truncate(1);
        assert_eq!(
            engine.draw_card(players[0]).unwrap_err(),
            GameError::NoCardsAvailable
        );
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn short_penalty_reports_cards_actually_drawn() {
        let (mut engine, players) = engine_with(3);
        engine.draw_pile.truncate(1);
        engine.discard_pile.clear();
        let draw_two = Card::action(Color::Red, ActionKind::DrawTwo);
        let id = draw_two.id;
        engine.seats[0].hand.push(draw_two);

        let actions = engine.play_card(players[0], id, None, NOW).unwrap();
        assert!(actions.contains(&GameAction::DrawCard {
            player_id: players[1],
            count: 1
        }));
    }

    #[test]
    fn turn_skips_disconnected_seats() {
        let (mut engine, players) = engine_with(4);
        engine.disconnect_player(players[1], NOW).unwrap();
        engine.disconnect_player(players[2], NOW).unwrap();
        engine.draw_card(players[0]).unwrap();
        assert_eq!(engine.current_player(), Some(players[3]));
    }

    #[test]
    fn disconnect_on_turn_advances() {
        let (mut engine, players) = engine_with(3);
        let actions = engine.disconnect_player(players[0], NOW).unwrap();
        assert!(actions.is_empty());
        assert_eq!(engine.current_player(), Some(players[1]));
        let seat = engine.seat(players[0]).unwrap();
        assert!(!seat.is_connected());
        assert_eq!(seat.disconnected_at(), Some(NOW));
    }

    #[test]
    fn last_connected_player_wins() {
        let (mut engine, players) = engine_with(3);
        give(&mut engine, 2, (0..9).map(|v| Card::number(Color::Red, v)).collect());
        engine.disconnect_player(players[0], NOW).unwrap();
        assert_eq!(engine.status(), GameStatus::Playing);

        let actions = engine.disconnect_player(players[1], NOW).unwrap();
        assert_eq!(engine.status(), GameStatus::Finished);
        assert_eq!(engine.winner(), Some(players[2]));
        assert_eq!(
            actions,
            vec![GameAction::GameOver {
                winner_id: players[2]
            }]
        );
    }

    #[test]
    fn reconnect_rekeys_without_touching_state() {
        let (mut engine, players) = engine_with(3);
        engine.disconnect_player(players[1], NOW).unwrap();
        let hand = engine.seats[1].hand.clone();
        let current = engine.current_index();
        let direction = engine.direction();

        let new_id = Uuid::from_u128(500);
        engine.reconnect_player(players[1], new_id).unwrap();
        let seat = &engine.seats[1];
        assert_eq!(seat.id(), new_id);
        assert!(seat.is_connected());
        assert_eq!(seat.disconnected_at(), None);
        assert_eq!(seat.hand, hand);
        assert_eq!(engine.current_index(), current);
        assert_eq!(engine.direction(), direction);
        assert!(engine.seat(players[1]).is_none());

        assert_eq!(
            engine.reconnect_player(players[1], new_id),
            Err(GameError::PlayerNotFound)
        );
    }

    #[test]
    fn reconnect_carries_obligation_to_new_id() {
        let (mut engine, players) = engine_with(2);
        set_top(&mut engine, Card::number(Color::Red, 5));
        let card = Card::number(Color::Red, 9);
        let id = card.id;
        give(&mut engine, 0, vec![card, Card::number(Color::Blue, 1)]);
        engine.play_card(players[0], id, None, NOW).unwrap();

        let new_id = Uuid::from_u128(77);
        engine.reconnect_player(players[0], new_id).unwrap();
        assert_eq!(engine.obligation().unwrap().player_id, new_id);
        assert!(engine.call_uno(new_id).is_ok());
    }

    #[test]
    fn card_conservation_over_a_random_game() {
        let (mut engine, players) = engine_with(4);
        let expected = all_ids(&engine);
        let mut now = NOW;

        for _ in 0..400 {
            if engine.status() == GameStatus::Finished {
                break;
            }
            now += 10;
            let player = engine.current_player().unwrap();
            let top = engine.top_card().cloned().unwrap();
            let playable = engine
                .seat(player)
                .unwrap()
                .hand()
                .iter()
                .find(|c| rules::is_legal_play(c, &top))
                .map(|c| c.id);
            match playable {
                Some(card) => {
                    engine.play_card(player, card, Some(Color::Blue), now).unwrap();
                }
                None => {
                    if engine.draw_card(player).is_err() {
                        break;
                    }
                }
            }
            assert_eq!(all_ids(&engine), expected);
            assert!(players.contains(&engine.current_player().unwrap()));
        }
    }
}
