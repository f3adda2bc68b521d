//! Card identity and faces.
//!
//! A card is a unique id plus a [`CardFace`]. The only mutable part of a card
//! is the chosen color of a wild, set when it is played and cleared when it is
//! shuffled back into the draw pile.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a card within one deck.
pub type CardId = Uuid;

/// The four suit colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    /// All colors in deck generation order.
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colored cards with an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Skip,
    Reverse,
    DrawTwo,
}

impl ActionKind {
    /// All actions in deck generation order.
    pub const ALL: [ActionKind; 3] = [ActionKind::Skip, ActionKind::Reverse, ActionKind::DrawTwo];

    fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Reverse => "reverse",
            Self::DrawTwo => "draw_two",
        }
    }
}

/// Colorless cards that let the player pick the next color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WildKind {
    Wild,
    WildDrawFour,
}

impl WildKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Wild => "wild",
            Self::WildDrawFour => "wild_draw_four",
        }
    }
}

/// What is printed on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardFace {
    Number {
        color: Color,
        value: u8,
    },
    Action {
        color: Color,
        action: ActionKind,
    },
    Wild {
        wild_type: WildKind,
        /// Only meaningful once the card has been played.
        chosen_color: Option<Color>,
    },
}

/// A single card of a 108-card deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(flatten)]
    pub face: CardFace,
}

impl Card {
    /// Create a card with a fresh random id.
    pub fn new(face: CardFace) -> Self {
        Self {
            id: Uuid::new_v4(),
            face,
        }
    }

    pub fn number(color: Color, value: u8) -> Self {
        Self::new(CardFace::Number { color, value })
    }

    pub fn action(color: Color, action: ActionKind) -> Self {
        Self::new(CardFace::Action { color, action })
    }

    pub fn wild(wild_type: WildKind) -> Self {
        Self::new(CardFace::Wild {
            wild_type,
            chosen_color: None,
        })
    }

    /// The printed color, `None` for wilds.
    pub fn color(&self) -> Option<Color> {
        match self.face {
            CardFace::Number { color, .. } | CardFace::Action { color, .. } => Some(color),
            CardFace::Wild { .. } => None,
        }
    }

    /// The color this card counts as for matching. A wild counts as its
    /// chosen color, or as nothing while unset.
    pub fn effective_color(&self) -> Option<Color> {
        match self.face {
            CardFace::Number { color, .. } | CardFace::Action { color, .. } => Some(color),
            CardFace::Wild { chosen_color, .. } => chosen_color,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self.face, CardFace::Number { .. })
    }

    pub fn is_action(&self) -> bool {
        matches!(self.face, CardFace::Action { .. })
    }

    pub fn is_wild(&self) -> bool {
        matches!(self.face, CardFace::Wild { .. })
    }

    /// Record the color picked for a wild. No effect on other cards.
    pub fn choose_color(&mut self, color: Color) {
        if let CardFace::Wild { chosen_color, .. } = &mut self.face {
            *chosen_color = Some(color);
        }
    }

    /// Forget a wild's chosen color.
    pub fn reset_chosen_color(&mut self) {
        if let CardFace::Wild { chosen_color, .. } = &mut self.face {
            *chosen_color = None;
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.face {
            CardFace::Number { color, value } => write!(f, "{color} {value}"),
            CardFace::Action { color, action } => write!(f, "{color} {}", action.as_str()),
            CardFace::Wild { wild_type, .. } => f.write_str(wild_type.as_str()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(Card::number(Color::Red, 7).to_string(), "red 7");
        assert_eq!(
            Card::action(Color::Blue, ActionKind::DrawTwo).to_string(),
            "blue draw_two"
        );
        assert_eq!(Card::wild(WildKind::WildDrawFour).to_string(), "wild_draw_four");
    }

    #[test]
    fn chosen_color_only_sticks_to_wilds() {
        let mut wild = Card::wild(WildKind::Wild);
        assert_eq!(wild.effective_color(), None);
        wild.choose_color(Color::Green);
        assert_eq!(wild.effective_color(), Some(Color::Green));
        assert_eq!(wild.color(), None);
        wild.reset_chosen_color();
        assert_eq!(wild.effective_color(), None);

        let mut number = Card::number(Color::Yellow, 3);
        number.choose_color(Color::Red);
        assert_eq!(number.effective_color(), Some(Color::Yellow));
    }

    #[test]
    fn serializes_with_flattened_type_tag() {
        let card = Card::action(Color::Red, ActionKind::Skip);
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["type"], "action");
        assert_eq!(value["color"], "red");
        assert_eq!(value["action"], "skip");
        assert_eq!(value["id"], card.id.to_string());

        let wild = Card::wild(WildKind::WildDrawFour);
        let value = serde_json::to_value(&wild).unwrap();
        assert_eq!(value["type"], "wild");
        assert_eq!(value["wild_type"], "wild_draw_four");
        assert!(value["chosen_color"].is_null());

        let back: Card = serde_json::from_value(value).unwrap();
        assert_eq!(back, wild);
    }
}
