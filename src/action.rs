//! Action log entries.
//!
//! Every mutating engine call returns the entries it produced, in order. The
//! server replays them to all room members so every client renders the same
//! event sequence.

use serde::{Deserialize, Serialize};

use crate::card::{Card, Color};
use crate::engine::PlayerId;

/// One recorded game event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameAction {
    PlayCard { player_id: PlayerId, card: Card },
    DrawCard { player_id: PlayerId, count: usize },
    SkipTurn { player_id: PlayerId },
    Reverse { player_id: PlayerId },
    ColorChosen { player_id: PlayerId, color: Color },
    UnoCall { player_id: PlayerId },
    UnoCatch { catcher_id: PlayerId, target_id: PlayerId },
    GameOver { winner_id: PlayerId },
}

impl GameAction {
    /// The player the entry is about (the target, for a catch).
    pub fn subject(&self) -> PlayerId {
        match self {
            Self::PlayCard { player_id, .. }
            | Self::DrawCard { player_id, .. }
            | Self::SkipTurn { player_id }
            | Self::Reverse { player_id }
            | Self::ColorChosen { player_id, .. }
            | Self::UnoCall { player_id } => *player_id,
            Self::UnoCatch { target_id, .. } => *target_id,
            Self::GameOver { winner_id } => *winner_id,
        }
    }
}
