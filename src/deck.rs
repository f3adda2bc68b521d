//! Deck construction and shuffling.
//!
//! [`build`] produces the canonical 108 cards in a fixed order; [`permute`]
//! is an in-place Fisher-Yates shuffle over any random source.

use rand::Rng;
use uuid::Builder;

use crate::card::{ActionKind, Card, Color, WildKind};

/// Number of cards in a full deck.
pub const DECK_SIZE: usize = 108;

/// Build the unshuffled deck.
///
/// Per color: one `0`, two of each `1`-`9`, two of each action. Then four
/// wilds and four wild draw fours.
///
/// ```
/// let deck = uno_server::deck::build();
/// assert_eq!(deck.len(), 108);
/// ```
pub fn build() -> Vec<Card> {
    let mut cards = Vec::with_capacity(DECK_SIZE);

    for color in Color::ALL {
        cards.push(Card::number(color, 0));
        for value in 1..=9 {
            cards.push(Card::number(color, value));
            cards.push(Card::number(color, value));
        }
        for action in ActionKind::ALL {
            cards.push(Card::action(color, action));
            cards.push(Card::action(color, action));
        }
    }

    for _ in 0..4 {
        cards.push(Card::wild(WildKind::Wild));
    }
    for _ in 0..4 {
        cards.push(Card::wild(WildKind::WildDrawFour));
    }

    cards
}

/// Shuffle `items` in place with a Fisher-Yates pass.
pub fn permute<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Build a deck and shuffle it.
///
/// Card ids are drawn from `rng` as well, so a seeded source replays the
/// whole deck, ids included.
pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut cards = build();
    permute(&mut cards, rng);
    for card in &mut cards {
        card.id = Builder::from_random_bytes(rng.gen()).into_uuid();
    }
    cards
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::card::CardFace;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn deck_composition() {
        let deck = build();
        assert_eq!(deck.len(), DECK_SIZE);
        assert_eq!(deck.iter().filter(|c| c.is_number()).count(), 76);
        assert_eq!(deck.iter().filter(|c| c.is_action()).count(), 24);
        assert_eq!(deck.iter().filter(|c| c.is_wild()).count(), 8);

        let ids: HashSet<_> = deck.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), DECK_SIZE);
    }

    #[test]
    fn per_color_counts() {
        let deck = build();
        for color in Color::ALL {
            let colored: Vec<_> = deck.iter().filter(|c| c.color() == Some(color)).collect();
            assert_eq!(colored.len(), 25);
            let zeros = colored
                .iter()
                .filter(|c| matches!(c.face, CardFace::Number { value: 0, .. }))
                .count();
            assert_eq!(zeros, 1);
            for value in 1..=9 {
                let n = colored
                    .iter()
                    .filter(|c| matches!(c.face, CardFace::Number { value: v, .. } if v == value))
                    .count();
                assert_eq!(n, 2, "{color} {value}");
            }
        }
        let draw_fours = deck
            .iter()
            .filter(|c| {
                matches!(
                    c.face,
                    CardFace::Wild {
                        wild_type: WildKind::WildDrawFour,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(draw_fours, 4);
    }

    #[test]
    fn wilds_start_without_a_color() {
        assert!(build()
            .iter()
            .filter(|c| c.is_wild())
            .all(|c| c.effective_color().is_none()));
    }

    #[test]
    fn permute_is_a_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let fresh = build();
        let mut shuffled = fresh.clone();
        permute(&mut shuffled, &mut rng);

        let mut before: Vec<_> = fresh.iter().map(|c| c.id).collect();
        let mut after: Vec<_> = shuffled.iter().map(|c| c.id).collect();
        assert_ne!(before, after);
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn permute_is_deterministic_per_seed() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b = a.clone();
        permute(&mut a, &mut ChaCha8Rng::seed_from_u64(99));
        permute(&mut b, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_shuffles_replay_ids_too() {
        let a = shuffled(&mut ChaCha8Rng::seed_from_u64(5));
        let b = shuffled(&mut ChaCha8Rng::seed_from_u64(5));
        assert_eq!(a, b);

        let ids: HashSet<_> = a.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), DECK_SIZE);
        assert_ne!(a, shuffled(&mut ChaCha8Rng::seed_from_u64(6)));
    }

    #[test]
    fn permute_handles_tiny_inputs() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut empty: Vec<u8> = vec![];
        permute(&mut empty, &mut rng);
        let mut one = vec![5];
        permute(&mut one, &mut rng);
        assert_eq!(one, vec![5]);
    }
}
