#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Room lifecycle through the registry: membership, hosts, start guards,
//! suspension, reconnection and grace expiry.

use tokio_test::{assert_err, assert_ok};
use uno_server::config::ServerConfig;
use uno_server::engine::{GameStatus, PlayerId};
use uno_server::room::{DisconnectOutcome, RoomRegistry, RoomStatus};
use uno_server::{GameError, RoomError};
use uuid::Uuid;

const NOW: u64 = 1_700_000_000_000;

fn pid(n: u128) -> PlayerId {
    Uuid::from_u128(n)
}

/// A waiting room with `names[0]` as host and everyone else joined.
fn room_with(registry: &mut RoomRegistry, names: &[&str]) -> (String, Vec<PlayerId>) {
    let ids: Vec<PlayerId> = (1..=names.len() as u128).map(pid).collect();
    let code = registry
        .create_room(ids[0], names[0], NOW)
        .unwrap()
        .code()
        .to_string();
    for (id, name) in ids.iter().zip(names).skip(1) {
        registry.join_room(&code, *id, name).unwrap();
    }
    (code, ids)
}

fn registry() -> RoomRegistry {
    RoomRegistry::new(ServerConfig::new().with_seed(3))
}

#[test]
fn join_rejections() {
    let mut registry = RoomRegistry::new(ServerConfig::new().with_seed(3).with_max_players(2));
    let (code, _) = room_with(&mut registry, &["Ann", "Bob"]);

    assert_eq!(
        registry.join_room("NOPE00", pid(10), "Cat").unwrap_err(),
        RoomError::RoomNotFound
    );
    assert_eq!(
        registry.join_room(&code, pid(10), "Cat").unwrap_err(),
        RoomError::RoomFull
    );
    assert_eq!(
        registry.join_room("   ", pid(10), "Cat").unwrap_err(),
        RoomError::RoomCodeRequired
    );
    assert_eq!(
        registry.join_room(&code, pid(10), "").unwrap_err(),
        RoomError::NameRequired
    );
}

#[test]
fn names_are_unique_per_room() {
    let mut registry = registry();
    let (code, _) = room_with(&mut registry, &["Ann"]);

    assert_eq!(
        registry.join_room(&code, pid(2), " Ann ").unwrap_err(),
        RoomError::NameTaken
    );
    // Another room may reuse it.
    let other = registry.create_room(pid(3), "Ann", NOW).unwrap().code().to_string();
    assert_ne!(other, code);
}

#[test]
fn start_guards_in_order() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann"]);

    assert_eq!(registry.start_game(pid(99)).unwrap_err(), RoomError::NotInRoom);
    assert_eq!(
        registry.start_game(ids[0]).unwrap_err(),
        RoomError::NotEnoughPlayers { min: 2 }
    );

    registry.join_room(&code, pid(2), "Bob").unwrap();
    assert_eq!(registry.start_game(pid(2)).unwrap_err(), RoomError::NotHost);

    let room = assert_ok!(registry.start_game(ids[0]));
    assert_eq!(room.status(), RoomStatus::Playing);
    assert!(room.snapshot().players.iter().all(|p| p.card_count == 7));

    assert_eq!(
        registry.start_game(ids[0]).unwrap_err(),
        RoomError::GameAlreadyStarted
    );
    assert_eq!(
        registry.join_room(&code, pid(3), "Cat").unwrap_err(),
        RoomError::GameAlreadyInProgress
    );
}

#[test]
fn leaving_a_waiting_room_transfers_host_then_deletes() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob", "Cat"]);

    let outcome = registry.leave_room(ids[0], NOW).unwrap();
    assert_eq!(outcome.new_host, Some(ids[1]));
    assert!(!outcome.room_deleted);
    let room = registry.room(&code).unwrap();
    assert_eq!(room.host_id(), ids[1]);
    assert!(room.player(ids[1]).unwrap().is_host);

    // A non-host leaving keeps the host.
    let outcome = registry.leave_room(ids[2], NOW).unwrap();
    assert_eq!(outcome.new_host, None);

    let outcome = registry.leave_room(ids[1], NOW).unwrap();
    assert!(outcome.room_deleted);
    assert!(registry.room(&code).is_none());
    assert_eq!(registry.room_count(), 0);
    assert!(registry.leave_room(ids[1], NOW).is_none());
}

#[test]
fn disconnect_while_waiting_is_a_leave() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob"]);

    match registry.disconnect(ids[1], NOW) {
        Some(DisconnectOutcome::Left(outcome)) => assert_eq!(outcome.player_id, ids[1]),
        other => panic!("expected a leave, got {other:?}"),
    }
    assert_eq!(registry.room(&code).unwrap().players().len(), 1);
    assert!(registry.room_of(ids[1]).is_none());
}

#[test]
fn host_disconnect_mid_game_passes_host_to_a_connected_player() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob", "Cat"]);
    registry.start_game(ids[0]).unwrap();

    match registry.disconnect(ids[0], NOW) {
        Some(DisconnectOutcome::Suspended { actions, .. }) => assert!(actions.is_empty()),
        other => panic!("expected a suspension, got {other:?}"),
    }
    let room = registry.room(&code).unwrap();
    let ann = room.player(ids[0]).unwrap();
    assert!(!ann.is_connected);
    assert_eq!(ann.disconnected_at, Some(NOW));
    // Still seated, still host, until the grace period runs out.
    assert_eq!(room.host_id(), ids[0]);
    assert_eq!(room.engine().unwrap().current_player(), Some(ids[1]));

    let outcome = registry.expire_seat(&code, ids[0]).unwrap();
    assert_eq!(outcome.new_host, Some(ids[1]));
    let room = registry.room(&code).unwrap();
    assert!(room.player(ids[0]).is_none());
    let engine = room.engine().unwrap();
    assert!(engine.seat(ids[1]).unwrap().is_host());
    // The engine keeps the abandoned seat's cards.
    assert_eq!(engine.seat(ids[0]).unwrap().card_count(), 7);
}

#[test]
fn reconnect_restores_the_suspended_seat() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob", "Cat"]);
    registry.start_game(ids[0]).unwrap();
    let hand = registry
        .room(&code)
        .unwrap()
        .engine()
        .unwrap()
        .seat(ids[2])
        .unwrap()
        .hand()
        .to_vec();

    registry.disconnect(ids[2], NOW).unwrap();
    let back = assert_ok!(registry.reconnect(&code.to_lowercase(), "Cat"));
    assert_eq!(back.player_id, ids[2]);
    assert_eq!(back.code, code);

    let room = registry.room(&code).unwrap();
    assert!(room.player(ids[2]).unwrap().is_connected);
    let seat = room.engine().unwrap().seat(ids[2]).unwrap();
    assert!(seat.is_connected());
    assert_eq!(seat.hand(), hand.as_slice());

    // A returning player has nothing left to expire.
    assert!(registry.expire_seat(&code, ids[2]).is_none());
}

#[test]
fn reconnect_requires_a_disconnected_member() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob", "Cat"]);
    registry.start_game(ids[0]).unwrap();

    assert!(matches!(
        registry.reconnect(&code, "Bob"),
        Err(RoomError::ReconnectionFailed { .. })
    ));
    let err = assert_err!(registry.reconnect(&code, "Zed"));
    assert_eq!(
        err,
        RoomError::ReconnectionFailed {
            name: "Zed".into()
        }
    );
    assert_eq!(
        registry.reconnect("QQQQQQ", "Bob").unwrap_err(),
        RoomError::RoomNotFound
    );
}

#[test]
fn last_connected_player_finishes_the_room() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob"]);
    registry.start_game(ids[0]).unwrap();

    match registry.disconnect(ids[1], NOW) {
        Some(DisconnectOutcome::Suspended { actions, .. }) => assert!(!actions.is_empty()),
        other => panic!("expected a suspension, got {other:?}"),
    }
    let room = registry.room(&code).unwrap();
    assert_eq!(room.status(), RoomStatus::Finished);
    let engine = room.engine().unwrap();
    assert_eq!(engine.status(), GameStatus::Finished);
    assert_eq!(engine.winner(), Some(ids[0]));

    // Finished rooms treat a disconnect as a plain leave.
    assert!(matches!(
        registry.disconnect(ids[0], NOW),
        Some(DisconnectOutcome::Left(_))
    ));
}

#[test]
fn host_falls_back_to_a_disconnected_member() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob", "Cat"]);
    registry.start_game(ids[0]).unwrap();
    registry.disconnect(ids[1], NOW).unwrap();
    registry.disconnect(ids[2], NOW).unwrap();
    assert_eq!(registry.room(&code).unwrap().status(), RoomStatus::Finished);

    // Nobody left is connected, so the first remaining member takes over.
    let outcome = registry.leave_room(ids[0], NOW).unwrap();
    assert_eq!(outcome.new_host, Some(ids[1]));
    assert!(!outcome.room_deleted);
    let room = registry.room(&code).unwrap();
    assert_eq!(room.host_id(), ids[1]);
    assert!(room.player(ids[1]).unwrap().is_host);
    assert!(room.engine().unwrap().seat(ids[1]).unwrap().is_host());
}

#[test]
fn leaving_a_finished_room_disconnects_the_seat() {
    let mut registry = registry();
    let (code, ids) = room_with(&mut registry, &["Ann", "Bob"]);
    registry.start_game(ids[0]).unwrap();
    registry.disconnect(ids[1], NOW).unwrap();
    assert_ok!(registry.reconnect(&code, "Bob"));

    let outcome = registry.leave_room(ids[0], NOW + 5).unwrap();
    assert!(outcome.actions.is_empty());
    let engine = registry.room(&code).unwrap().engine().unwrap();
    let ann = engine.seat(ids[0]).unwrap();
    assert!(!ann.is_connected());
    assert_eq!(ann.disconnected_at(), Some(NOW + 5));
    assert_eq!(engine.winner(), Some(ids[0]));

    let view = engine.client_state(ids[1]);
    let listed = view.players.iter().find(|p| p.id == ids[0]).unwrap();
    assert!(!listed.is_connected);
}

#[test]
fn engine_errors_pass_through_with_engine() {
    let mut registry = registry();
    let (_code, ids) = room_with(&mut registry, &["Ann", "Bob"]);

    assert_eq!(
        registry.with_engine(ids[0], |e| e.draw_card(ids[0])).unwrap_err(),
        RoomError::NoGameInProgress
    );
    registry.start_game(ids[0]).unwrap();
    assert_eq!(
        registry.with_engine(ids[1], |e| e.draw_card(ids[1])).unwrap_err(),
        RoomError::Game(GameError::NotYourTurn)
    );
    assert_eq!(
        registry.with_engine(pid(42), |e| e.draw_card(pid(42))).unwrap_err(),
        RoomError::NotInRoom
    );
}
