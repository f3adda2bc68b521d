//! Pure rule predicates over cards.

use crate::card::{ActionKind, Card, CardFace, WildKind};

/// Whether `card` may be played on top of `top`.
///
/// Wilds are always legal. Otherwise the card must share the top card's
/// effective color, or the same number, or the same action. A wild on top
/// whose color is unset matches nothing by color.
pub fn is_legal_play(card: &Card, top: &Card) -> bool {
    if card.is_wild() {
        return true;
    }

    if let (Some(color), Some(top_color)) = (card.color(), top.effective_color()) {
        if color == top_color {
            return true;
        }
    }

    match (card.face, top.face) {
        (CardFace::Number { value, .. }, CardFace::Number { value: top_value, .. }) => {
            value == top_value
        }
        (CardFace::Action { action, .. }, CardFace::Action { action: top_action, .. }) => {
            action == top_action
        }
        _ => false,
    }
}

/// Cards the next player must draw: 2 for draw two, 4 for wild draw four.
pub fn draw_penalty(card: &Card) -> usize {
    match card.face {
        CardFace::Action {
            action: ActionKind::DrawTwo,
            ..
        } => 2,
        CardFace::Wild {
            wild_type: WildKind::WildDrawFour,
            ..
        } => 4,
        _ => 0,
    }
}

/// Whether the next player loses their turn.
///
/// Reverse only skips when two players are seated, where it behaves as a skip.
pub fn skips_next(card: &Card, player_count: usize) -> bool {
    match card.face {
        CardFace::Action { action, .. } => match action {
            ActionKind::Skip | ActionKind::DrawTwo => true,
            ActionKind::Reverse => player_count == 2,
        },
        CardFace::Wild { wild_type, .. } => wild_type == WildKind::WildDrawFour,
        CardFace::Number { .. } => false,
    }
}

pub fn reverses_direction(card: &Card) -> bool {
    matches!(
        card.face,
        CardFace::Action {
            action: ActionKind::Reverse,
            ..
        }
    )
}

pub fn requires_color_choice(card: &Card) -> bool {
    card.is_wild()
}
