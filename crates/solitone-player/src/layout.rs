//! A dealt Klondike table the demo feeds to the engine

use solitone_core::{Card, CardLocation, CardSource, ListenMode, Rank, Suit};

const COLUMNS: usize = 7;
const COLUMN_X: f32 = 100.0;
const TABLEAU_Y: f32 = 200.0;
/// Wider than the row tolerance so each tableau depth reads as its own row
const FAN_Y: f32 = 60.0;
const WASTE_X: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct KlondikeLayout {
    cards: Vec<Card>,
    /// Stock indices into `cards`, top of the pile last
    stock: Vec<usize>,
    /// Waste indices, top of the pile last
    waste: Vec<usize>,
}

impl KlondikeLayout {
    pub fn deal(rng: &mut fastrand::Rng) -> Self {
        let mut deck: Vec<(Suit, Rank)> = Suit::RANKED
            .iter()
            .flat_map(|&suit| Rank::all().map(move |rank| (suit, rank)))
            .collect();
        rng.shuffle(&mut deck);

        let mut cards = Vec::with_capacity(deck.len());
        let mut next = deck.into_iter().enumerate();

        for column in 0..COLUMNS {
            for depth in 0..=column {
                let Some((id, (suit, rank))) = next.next() else { break };
                cards.push(
                    Card::new(id as u32, suit, rank)
                        .face_up(depth == column)
                        .positioned(column as f32 * COLUMN_X, TABLEAU_Y + depth as f32 * FAN_Y),
                );
            }
        }

        let mut stock = Vec::new();
        for (id, (suit, rank)) in next {
            stock.push(cards.len());
            cards.push(Card::new(id as u32, suit, rank).at(CardLocation::Stock).positioned(0.0, 0.0));
        }

        Self {
            cards,
            stock,
            waste: Vec::new(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn stock_len(&self) -> usize {
        self.stock.len()
    }

    /// Turn the top stock card onto the waste. Returns false once the stock
    /// is empty.
    pub fn draw(&mut self) -> bool {
        let Some(idx) = self.stock.pop() else {
            return false;
        };
        let waste_depth = self.waste.len();
        self.waste.push(idx);
        let card = &mut self.cards[idx];
        card.location = CardLocation::Waste;
        card.face_up = true;
        card.position = (WASTE_X + waste_depth as f32 * 0.5, 0.0);
        true
    }
}

impl CardSource for KlondikeLayout {
    /// Only the top of the waste pile sounds; the cards under it are covered
    fn triggering_cards(&self, mode: ListenMode) -> Vec<Card> {
        let top_waste = self.waste.last().map(|&idx| &self.cards[idx]);
        self.cards
            .iter()
            .filter(|c| c.location != CardLocation::Waste)
            .chain(top_waste)
            .filter(|c| mode.matches(c.face_up))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deal_shape() {
        let layout = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(3));
        assert_eq!(layout.cards().len(), 52);
        assert_eq!(layout.stock_len(), 24);
        assert_eq!(layout.active_card_count(ListenMode::FaceUp), COLUMNS);
        assert_eq!(layout.active_card_count(ListenMode::FaceDown), 52 - COLUMNS);
    }

    #[test]
    fn test_same_seed_same_deal() {
        let a = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(11));
        let b = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(11));
        assert_eq!(a.cards(), b.cards());
    }

    #[test]
    fn test_draw_moves_stock_to_waste() {
        let mut layout = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(5));
        assert!(layout.draw());
        assert_eq!(layout.stock_len(), 23);
        let up = layout.triggering_cards(ListenMode::FaceUp);
        assert_eq!(up.len(), COLUMNS + 1);
        assert!(up.iter().any(|c| c.location == CardLocation::Waste));

        while layout.draw() {}
        assert_eq!(layout.stock_len(), 0);
        assert!(!layout.draw());
    }

    #[test]
    fn test_only_top_waste_card_triggers() {
        let mut layout = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(5));
        for _ in 0..3 {
            layout.draw();
        }
        let top = layout.cards()[layout.waste[2]].id;
        let waste: Vec<_> = layout
            .triggering_cards(ListenMode::FaceUp)
            .into_iter()
            .filter(|c| c.location == CardLocation::Waste)
            .map(|c| c.id)
            .collect();
        assert_eq!(waste, vec![top]);
        assert_eq!(layout.active_card_count(ListenMode::FaceUp), COLUMNS + 1);
        assert_eq!(layout.active_card_count(ListenMode::FaceDown), 52 - COLUMNS - 3);
    }
}
