//! Wire protocol between game clients and the room server.
//!
//! Both directions are JSON objects of the form `{"type": ..., "data": ...}`.
//! Unit variants such as `Ping` carry no `data` field.

use serde::{Deserialize, Serialize};

use crate::action::GameAction;
use crate::card::{Card, CardId, Color};
use crate::engine::PlayerId;
use crate::error_codes::ErrorCode;
use crate::projection::{ClientGameState, PublicPlayer};
use crate::room::RoomSnapshot;

/// Which request an accept/reject reply refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateRoom,
    JoinRoom,
    Reconnect,
    LeaveRoom,
    StartGame,
    PlayCard,
    DrawCard,
    CallUno,
    CatchUno,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Open a new room and become its host.
    CreateRoom { player_name: String },
    /// Join a waiting room by code.
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    /// Resume a suspended seat after a dropped connection.
    Reconnect {
        room_code: String,
        player_name: String,
    },
    /// Leave the current room.
    LeaveRoom,
    /// Host only: deal and begin.
    StartGame,
    PlayCard {
        card_id: CardId,
        /// Required for wild cards, ignored otherwise.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chosen_color: Option<Color>,
    },
    DrawCard,
    /// Declare UNO while holding one card.
    CallUno,
    /// Accuse a player who did not declare in time.
    CatchUno { target_id: PlayerId },
    /// Announce presence on the voice channel.
    VoiceJoin,
    VoiceLeave,
    /// Opaque peer signaling payload for one room member.
    VoiceSignal {
        target_id: PlayerId,
        signal: serde_json::Value,
    },
    /// Heartbeat to maintain connection.
    Ping,
}

impl ClientMessage {
    /// The intent this message expresses, if it gets an accept/reject reply.
    pub fn intent(&self) -> Option<Intent> {
        match self {
            Self::CreateRoom { .. } => Some(Intent::CreateRoom),
            Self::JoinRoom { .. } => Some(Intent::JoinRoom),
            Self::Reconnect { .. } => Some(Intent::Reconnect),
            Self::LeaveRoom => Some(Intent::LeaveRoom),
            Self::StartGame => Some(Intent::StartGame),
            Self::PlayCard { .. } => Some(Intent::PlayCard),
            Self::DrawCard => Some(Intent::DrawCard),
            Self::CallUno => Some(Intent::CallUno),
            Self::CatchUno { .. } => Some(Intent::CatchUno),
            Self::VoiceJoin | Self::VoiceLeave | Self::VoiceSignal { .. } | Self::Ping => None,
        }
    }
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Reply to a successful create, join or reconnect.
    RoomJoined {
        room: RoomSnapshot,
        player_id: PlayerId,
        #[serde(default)]
        reconnected: bool,
    },
    /// The request was applied. Its effects arrive as separate messages.
    IntentAccepted { intent: Intent },
    /// The request was refused and nothing changed.
    IntentRejected {
        intent: Intent,
        reason: String,
        error_code: ErrorCode,
    },
    /// Roster or status changed.
    RoomUpdated { room: RoomSnapshot },
    PlayerJoined { player: PublicPlayer },
    PlayerLeft { player_id: PlayerId },
    HostChanged { host_id: PlayerId },
    /// The game began; tailored to the recipient (boxed to reduce enum size).
    GameStarted(Box<ClientGameState>),
    /// Sent after every mutating intent; tailored to the recipient.
    GameStateUpdated(Box<ClientGameState>),
    /// One entry of the shared action log.
    GameAction(GameAction),
    /// The recipient's hand after they drew.
    HandUpdated { hand: Vec<Card> },
    GameOver { winner_id: PlayerId },
    PlayerDisconnected { player_id: PlayerId },
    PlayerReconnected { player_id: PlayerId },
    /// Short informational text for display.
    Toast { message: String },
    VoicePeerJoined { peer_id: PlayerId },
    VoicePeerLeft { peer_id: PlayerId },
    VoiceSignal {
        from_id: PlayerId,
        signal: serde_json::Value,
    },
    /// Pong response to ping.
    Pong,
    /// Error not tied to a specific intent.
    Error {
        message: String,
        error_code: ErrorCode,
    },
}

impl ServerMessage {
    /// Build a rejection carrying the error's text and wire code.
    pub fn rejected(intent: Intent, code: ErrorCode, reason: impl std::fmt::Display) -> Self {
        Self::IntentRejected {
            intent,
            reason: reason.to_string(),
            error_code: code,
        }
    }
}
