//! Card model and the game-state contract the music engine reads from

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoliToneError};

/// Vertical distance (in layout units) within which cards count as one row
pub const ROW_TOLERANCE: f32 = 50.0;

/// Card suit. `Joker` has no rank and always sounds the top step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
    Joker,
}

impl Suit {
    /// The four ranked suits in deck order
    pub const RANKED: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn is_red(self) -> bool {
        matches!(self, Self::Hearts | Self::Diamonds)
    }

    /// Position in deck order, `None` for the joker
    pub fn index(self) -> Option<usize> {
        Self::RANKED.iter().position(|&s| s == self)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hearts => "hearts",
            Self::Diamonds => "diamonds",
            Self::Clubs => "clubs",
            Self::Spades => "spades",
            Self::Joker => "joker",
        };
        f.write_str(name)
    }
}

impl FromStr for Suit {
    type Err = SoliToneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hearts" => Ok(Self::Hearts),
            "diamonds" => Ok(Self::Diamonds),
            "clubs" => Ok(Self::Clubs),
            "spades" => Ok(Self::Spades),
            "joker" => Ok(Self::Joker),
            _ => Err(SoliToneError::UnknownSuit(s.to_string())),
        }
    }
}

/// Card rank, 1 (ace) through 13 (king)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    pub const ACE: Rank = Rank(1);
    pub const KING: Rank = Rank(13);

    pub fn new(value: u8) -> Result<Self> {
        if (1..=13).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SoliToneError::InvalidRank(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Ordinal used by the pitch mapper: ace is the highest (13), two is 1
    pub fn ordinal(self) -> u8 {
        if self.0 == 1 { 13 } else { self.0 - 1 }
    }

    /// All thirteen ranks, ace first
    pub fn all() -> impl Iterator<Item = Rank> {
        (1..=13).map(Rank)
    }
}

impl TryFrom<u8> for Rank {
    type Error = SoliToneError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> u8 {
        rank.0
    }
}

/// Stable identity assigned by the game-state collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub u32);

/// Where a card currently lives on the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CardLocation {
    #[default]
    Tableau,
    Foundation,
    Waste,
    Stock,
    Hand,
}

impl CardLocation {
    /// Stock and waste are draw/reserve piles
    pub fn is_reserve(self) -> bool {
        matches!(self, Self::Stock | Self::Waste)
    }
}

/// Which face of the cards the loop listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenMode {
    #[default]
    FaceUp,
    FaceDown,
}

impl ListenMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::FaceUp => Self::FaceDown,
            Self::FaceDown => Self::FaceUp,
        }
    }

    pub fn matches(self, face_up: bool) -> bool {
        match self {
            Self::FaceUp => face_up,
            Self::FaceDown => !face_up,
        }
    }
}

/// A card as seen by the music engine (read-only snapshot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub suit: Suit,
    /// `None` for the joker
    pub rank: Option<Rank>,
    pub face_up: bool,
    pub location: CardLocation,
    /// Layout position (x, y) used for reading order
    pub position: (f32, f32),
}

impl Card {
    pub fn new(id: u32, suit: Suit, rank: Rank) -> Self {
        Self {
            id: CardId(id),
            suit,
            rank: Some(rank),
            face_up: false,
            location: CardLocation::Tableau,
            position: (0.0, 0.0),
        }
    }

    pub fn joker(id: u32) -> Self {
        Self {
            id: CardId(id),
            suit: Suit::Joker,
            rank: None,
            face_up: false,
            location: CardLocation::Tableau,
            position: (0.0, 0.0),
        }
    }

    pub fn face_up(mut self, face_up: bool) -> Self {
        self.face_up = face_up;
        self
    }

    pub fn at(mut self, location: CardLocation) -> Self {
        self.location = location;
        self
    }

    pub fn positioned(mut self, x: f32, y: f32) -> Self {
        self.position = (x, y);
        self
    }

    pub fn is_reserve(&self) -> bool {
        self.location.is_reserve()
    }
}

/// Game-state collaborator. The engine never observes mutations on its own;
/// the host calls `refresh_trigger_set` after a move.
pub trait CardSource {
    /// Cards eligible to sound under the given listen mode
    fn triggering_cards(&self, mode: ListenMode) -> Vec<Card>;

    /// Card count that drives the tempo subdivision
    fn active_card_count(&self, mode: ListenMode) -> usize {
        self.triggering_cards(mode).len()
    }
}

impl CardSource for [Card] {
    fn triggering_cards(&self, mode: ListenMode) -> Vec<Card> {
        self.iter().filter(|c| mode.matches(c.face_up)).cloned().collect()
    }
}

impl CardSource for Vec<Card> {
    fn triggering_cards(&self, mode: ListenMode) -> Vec<Card> {
        self.as_slice().triggering_cards(mode)
    }
}

/// Sort cards into visual reading order: rows top to bottom (cards within
/// `ROW_TOLERANCE` of a row's first card share the row), left to right inside a row.
pub fn sort_reading_order(cards: &mut Vec<Card>) {
    cards.sort_by(|a, b| a.position.1.total_cmp(&b.position.1));

    let mut rows: Vec<Vec<Card>> = Vec::new();
    for card in cards.drain(..) {
        match rows.last_mut() {
            Some(row) if (card.position.1 - row[0].position.1).abs() < ROW_TOLERANCE => row.push(card),
            _ => rows.push(vec![card]),
        }
    }

    for mut row in rows {
        row.sort_by(|a, b| a.position.0.total_cmp(&b.position.0));
        cards.extend(row);
    }
}
