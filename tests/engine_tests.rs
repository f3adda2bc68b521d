#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Whole-game properties of the turn engine, driven through its public API.

use std::collections::HashSet;

use uno_server::action::GameAction;
use uno_server::card::{Card, Color};
use uno_server::config::GameConfig;
use uno_server::deck::DECK_SIZE;
use uno_server::engine::{GameStatus, PlayerId, SeatSpec, TurnEngine};
use uno_server::rules::is_legal_play;
use uno_server::GameError;
use uuid::Uuid;

const NOW: u64 = 1_700_000_000_000;

fn seated(n: u128, seed: u64) -> (TurnEngine, Vec<PlayerId>) {
    let players: Vec<PlayerId> = (1..=n).map(Uuid::from_u128).collect();
    let seats = players
        .iter()
        .enumerate()
        .map(|(i, id)| SeatSpec::new(*id, format!("P{i}"), i == 0));
    let mut engine = TurnEngine::with_seed(seats, GameConfig::new(), seed);
    engine.start_game();
    (engine, players)
}

fn cards_in_play(engine: &TurnEngine) -> usize {
    engine.draw_pile_len()
        + engine.discard_pile().len()
        + engine.seats().iter().map(|s| s.card_count()).sum::<usize>()
}

/// One greedy move for whoever holds the turn. `None` once nothing can move.
fn greedy_move(engine: &mut TurnEngine) -> Option<Vec<GameAction>> {
    let current = engine.current_player()?;
    let top = engine.top_card()?.clone();
    let playable = engine
        .seat(current)?
        .hand()
        .iter()
        .find(|c| is_legal_play(c, &top))
        .cloned();

    match playable {
        Some(card) => {
            let color = card.is_wild().then_some(Color::Blue);
            Some(engine.play_card(current, card.id, color, NOW).unwrap())
        }
        None => match engine.draw_card(current) {
            Ok(drawn) => Some(drawn.actions),
            Err(GameError::NoCardsAvailable) => None,
            Err(e) => panic!("unexpected draw error: {e}"),
        },
    }
}

#[test]
fn games_conserve_cards_and_end_with_a_winner() {
    for seed in 0..20 {
        let (mut engine, players) = seated(2 + u128::from(seed % 5), seed);
        assert_eq!(cards_in_play(&engine), DECK_SIZE);

        for _ in 0..5_000 {
            if engine.status() == GameStatus::Finished {
                break;
            }
            let Some(actions) = greedy_move(&mut engine) else {
                break;
            };
            assert!(!actions.is_empty());
            assert_eq!(engine.last_action(), actions.last());
            assert_eq!(cards_in_play(&engine), DECK_SIZE, "seed {seed}");
            assert!(engine.current_index() < players.len());
        }

        if engine.status() == GameStatus::Finished {
            let winner = engine.winner().expect("finished game has a winner");
            assert_eq!(engine.seat(winner).unwrap().card_count(), 0);
            assert_eq!(
                engine.last_action(),
                Some(&GameAction::GameOver { winner_id: winner })
            );
        }
    }
}

#[test]
fn card_ids_stay_unique_across_reshuffles() {
    let (mut engine, _players) = seated(4, 9);
    for _ in 0..300 {
        if engine.status() == GameStatus::Finished || greedy_move(&mut engine).is_none() {
            break;
        }
    }

    let mut seen = HashSet::new();
    let everywhere = engine
        .discard_pile()
        .iter()
        .chain(engine.seats().iter().flat_map(|s| s.hand()));
    for card in everywhere {
        assert!(seen.insert(card.id), "duplicate card {card}");
    }
}

#[test]
fn same_seed_deals_the_same_cards() {
    let dealt = |seed| {
        let (engine, _) = seated(3, seed);
        let mut out: Vec<Card> = engine
            .seats()
            .iter()
            .flat_map(|s| s.hand().iter().cloned())
            .collect();
        out.extend(engine.top_card().cloned());
        out
    };

    // Ids as well as faces.
    assert_eq!(dealt(77), dealt(77));
    assert_ne!(dealt(77), dealt(78));
}

#[test]
fn finished_games_refuse_further_moves() {
    let (mut engine, players) = seated(3, 4);
    engine.disconnect_player(players[1], NOW).unwrap();
    let actions = engine.disconnect_player(players[2], NOW).unwrap();
    assert_eq!(actions, vec![GameAction::GameOver { winner_id: players[0] }]);

    let top = engine.top_card().unwrap().id;
    assert!(matches!(
        engine.play_card(players[0], top, None, NOW),
        Err(GameError::GameNotInProgress)
    ));
    assert!(matches!(
        engine.draw_card(players[0]),
        Err(GameError::GameNotInProgress)
    ));
}

#[test]
fn each_view_shows_only_its_own_hand() {
    let (engine, players) = seated(4, 12);

    for (index, id) in players.iter().enumerate() {
        let view = engine.client_state(*id);
        assert_eq!(view.my_index, Some(index));
        assert_eq!(view.hand, engine.seat(*id).unwrap().hand());
        assert_eq!(view.players.len(), 4);
        assert!(view.players.iter().all(|p| p.card_count == 7));
    }

    let outsider = engine.client_state(Uuid::from_u128(999));
    assert!(outsider.hand.is_empty());
    assert_eq!(outsider.my_index, None);
}

#[test]
fn reconnecting_keeps_the_turn_where_it_was() {
    let (mut engine, players) = seated(3, 21);
    let hand: Vec<_> = engine.seat(players[2]).unwrap().hand().to_vec();

    engine.disconnect_player(players[2], NOW).unwrap();
    assert_eq!(engine.current_player(), Some(players[0]));
    engine.reconnect_player(players[2], players[2]).unwrap();

    let seat = engine.seat(players[2]).unwrap();
    assert!(seat.is_connected());
    assert_eq!(seat.disconnected_at(), None);
    assert_eq!(seat.hand(), hand.as_slice());
    assert_eq!(engine.current_player(), Some(players[0]));
}
