//! Error types for the engine, the room manager and the server.
//!
//! Engine and room errors are validation failures: they are reported to the
//! acting connection only and never change shared state.

use thiserror::Error;

use crate::error_codes::ErrorCode;

/// Rejections raised by the turn engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("player not found")]
    PlayerNotFound,

    #[error("not your turn")]
    NotYourTurn,

    #[error("game not in progress")]
    GameNotInProgress,

    #[error("card not in hand")]
    CardNotInHand,

    #[error("invalid play")]
    InvalidPlay,

    #[error("must choose a color for wild card")]
    ColorRequired,

    #[error("no cards to draw")]
    NoCardsAvailable,

    #[error("no UNO to call")]
    NoObligationPending,

    #[error("target doesn't need to call UNO")]
    ObligationNotPending,

    #[error("UNO call window not expired")]
    WindowStillOpen,
}

impl GameError {
    /// Wire code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PlayerNotFound => ErrorCode::PlayerNotFound,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::GameNotInProgress => ErrorCode::GameNotInProgress,
            Self::CardNotInHand => ErrorCode::CardNotInHand,
            Self::InvalidPlay => ErrorCode::InvalidPlay,
            Self::ColorRequired => ErrorCode::ColorRequired,
            Self::NoCardsAvailable => ErrorCode::NoCardsAvailable,
            Self::NoObligationPending => ErrorCode::NoObligationPending,
            Self::ObligationNotPending => ErrorCode::ObligationNotPending,
            Self::WindowStillOpen => ErrorCode::WindowStillOpen,
        }
    }
}

/// Rejections raised by the room manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("name is required")]
    NameRequired,

    #[error("room code is required")]
    RoomCodeRequired,

    #[error("room not found")]
    RoomNotFound,

    #[error("game already in progress")]
    GameAlreadyInProgress,

    #[error("room is full")]
    RoomFull,

    #[error("name already taken")]
    NameTaken,

    #[error("not in a room")]
    NotInRoom,

    #[error("only host can start")]
    NotHost,

    #[error("need at least {min} players")]
    NotEnoughPlayers { min: usize },

    #[error("game already started")]
    GameAlreadyStarted,

    #[error("no game in progress")]
    NoGameInProgress,

    #[error("no disconnected player named {name:?} in this room")]
    ReconnectionFailed { name: String },

    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// Wire code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NameRequired => ErrorCode::NameRequired,
            Self::RoomCodeRequired => ErrorCode::RoomCodeRequired,
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::GameAlreadyInProgress => ErrorCode::GameAlreadyInProgress,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::NameTaken => ErrorCode::NameTaken,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            Self::GameAlreadyStarted => ErrorCode::GameAlreadyStarted,
            Self::NoGameInProgress => ErrorCode::NoGameInProgress,
            Self::ReconnectionFailed { .. } => ErrorCode::ReconnectionFailed,
            Self::Game(err) => err.code(),
        }
    }
}

/// Errors that can occur when running the server or one of its connections.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The room actor is no longer running.
    #[error("room server is not running")]
    ServerClosed,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// A room or game intent was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GameError> for ServerError {
    fn from(err: GameError) -> Self {
        Self::Room(RoomError::Game(err))
    }
}

impl ServerError {
    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Room(err) => err.code(),
            Self::Serialization(_) => ErrorCode::InvalidInput,
            Self::ServerClosed => ErrorCode::ServiceUnavailable,
            _ => ErrorCode::InternalError,
        }
    }
}

/// A specialized [`Result`] type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_errors_keep_their_code_through_room_and_server_layers() {
        let room: RoomError = GameError::WindowStillOpen.into();
        assert_eq!(room.code(), ErrorCode::WindowStillOpen);
        assert_eq!(room.to_string(), "UNO call window not expired");

        let server: ServerError = GameError::NotYourTurn.into();
        assert_eq!(server.code(), ErrorCode::NotYourTurn);
    }

    #[test]
    fn not_enough_players_reports_minimum() {
        let err = RoomError::NotEnoughPlayers { min: 2 };
        assert_eq!(err.to_string(), "need at least 2 players");
        assert_eq!(err.code(), ErrorCode::NotEnoughPlayers);
    }

    #[test]
    fn transport_errors_are_internal() {
        assert_eq!(ServerError::TransportClosed.code(), ErrorCode::InternalError);
        assert_eq!(ServerError::ServerClosed.code(), ErrorCode::ServiceUnavailable);
    }
}
