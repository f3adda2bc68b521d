//! Error codes for structured error handling on the wire.
//!
//! Every rejected intent carries one of these codes next to its human-readable
//! reason. Codes serialize as `SCREAMING_SNAKE_CASE` strings so clients can
//! branch on them without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes sent to clients in `IntentRejected` and `Error` messages.
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidInput,
    NameRequired,
    RoomCodeRequired,

    // Room errors
    RoomNotFound,
    RoomFull,
    NameTaken,
    NotInRoom,
    GameAlreadyInProgress,

    // Lobby errors
    NotHost,
    NotEnoughPlayers,
    GameAlreadyStarted,
    NoGameInProgress,

    // Turn errors
    PlayerNotFound,
    NotYourTurn,
    GameNotInProgress,
    CardNotInHand,
    InvalidPlay,
    ColorRequired,
    NoCardsAvailable,

    // Declare obligation errors
    NoObligationPending,
    ObligationNotPending,
    WindowStillOpen,

    // Reconnection errors
    ReconnectionFailed,

    // Server errors
    InternalError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            // Validation errors
            Self::InvalidInput => "The request could not be understood. Check the message format.",
            Self::NameRequired => "A display name is required.",
            Self::RoomCodeRequired => "A room code is required.",

            // Room errors
            Self::RoomNotFound => {
                "The requested room could not be found. It may have been closed or the code is incorrect."
            }
            Self::RoomFull => "The room has reached its maximum player capacity.",
            Self::NameTaken => "Another player in this room already uses that name.",
            Self::NotInRoom => "You are not currently in any room. Join a room first.",
            Self::GameAlreadyInProgress => {
                "A game is already running in this room. New players cannot join until it ends."
            }

            // Lobby errors
            Self::NotHost => "Only the room host can start the game.",
            Self::NotEnoughPlayers => "At least two players are needed to start a game.",
            Self::GameAlreadyStarted => "The game in this room has already started.",
            Self::NoGameInProgress => "There is no game running in this room.",

            // Turn errors
            Self::PlayerNotFound => "That player is not seated in this game.",
            Self::NotYourTurn => "It is not your turn.",
            Self::GameNotInProgress => "The game is not in progress.",
            Self::CardNotInHand => "That card is not in your hand.",
            Self::InvalidPlay => "That card cannot be played on the current discard.",
            Self::ColorRequired => "Wild cards need a chosen color.",
            Self::NoCardsAvailable => "There are no cards left to draw.",

            // Declare obligation errors
            Self::NoObligationPending => "You have no UNO to call.",
            Self::ObligationNotPending => "That player does not need to call UNO.",
            Self::WindowStillOpen => "The UNO call window has not expired yet.",

            // Reconnection errors
            Self::ReconnectionFailed => {
                "No disconnected seat with that name exists in the room. Join as a new player instead."
            }

            // Server errors
            Self::InternalError => "An internal server error occurred. Please try again.",
            Self::ServiceUnavailable => "The server is shutting down. Please try again later.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
