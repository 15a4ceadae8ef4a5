//! 53-EDO pitch mapping: cards to scale steps, steps to frequencies

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::{Rank, Suit};
use crate::error::{Result, SoliToneError};

/// Equal divisions of the octave
pub const EDO: u16 = 53;

/// Step used by the joker and by malformed cards
pub const JOKER_STEP: ScaleStep = ScaleStep(52);

/// Unison, major third, fifth, major seventh, octave
pub const ACCENT_STEPS: [u16; 5] = [0, 17, 31, 44, 53];

/// Reference pitch for snapping the fundamental to the 53-EDO grid
pub const REFERENCE_HZ: f64 = 440.0;

/// Index into the 53-EDO scale. 0 is the fundamental, 53 the octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScaleStep(u16);

impl ScaleStep {
    pub const UNISON: ScaleStep = ScaleStep(0);
    pub const OCTAVE: ScaleStep = ScaleStep(EDO);

    pub fn new(step: u16) -> Result<Self> {
        if step <= EDO {
            Ok(Self(step))
        } else {
            Err(SoliToneError::InvalidStep(step))
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Pitch class, 0..53
    pub fn pitch_class(self) -> u16 {
        self.0 % EDO
    }

    pub fn is_accented(self) -> bool {
        ACCENT_STEPS.contains(&self.0) || ACCENT_STEPS.contains(&self.pitch_class())
    }

    /// Two steps are adjacent when exactly one step apart
    pub fn is_adjacent(self, other: ScaleStep) -> bool {
        self.0.abs_diff(other.0) == 1
    }

    /// Step offset by `interval`, allowed to exceed the octave (harmonic partials)
    pub fn raw_offset(self, interval: u16) -> u16 {
        self.0 + interval
    }
}

impl fmt::Display for ScaleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which (suit, rank) to step layout is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TuningScheme {
    /// Hearts/clubs interleave the lower half, diamonds/spades the upper half
    #[default]
    Alternating,
    /// Root, filler, fifth and seventh bands
    PerfectFifths,
    /// Root, third and fifth bands with clubs filling the gaps
    MajorTriads,
    /// Four contiguous 13-step blocks
    ChromaticBlocks,
}

impl TuningScheme {
    pub const ALL: [TuningScheme; 4] = [
        TuningScheme::Alternating,
        TuningScheme::PerfectFifths,
        TuningScheme::MajorTriads,
        TuningScheme::ChromaticBlocks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Alternating => "Alternating Steps",
            Self::PerfectFifths => "Perfect Fifths",
            Self::MajorTriads => "Major Triads",
            Self::ChromaticBlocks => "Chromatic Blocks",
        }
    }

    /// Next scheme in cycling order
    pub fn next(self) -> Self {
        match self {
            Self::Alternating => Self::PerfectFifths,
            Self::PerfectFifths => Self::MajorTriads,
            Self::MajorTriads => Self::ChromaticBlocks,
            Self::ChromaticBlocks => Self::Alternating,
        }
    }
}

/// Map a card to its scale step under `tuning`.
///
/// Jokers map to step 52. A ranked suit without a rank is malformed input
/// and takes the same fallback instead of failing.
pub fn map_to_step(suit: Suit, rank: Option<Rank>, tuning: TuningScheme) -> ScaleStep {
    let Some(rank) = rank else {
        return JOKER_STEP;
    };
    // 0..=12, ace last
    let o = (rank.ordinal() - 1) as u16;

    let step = match (tuning, suit) {
        (_, Suit::Joker) => return JOKER_STEP,

        (TuningScheme::Alternating, Suit::Hearts) => o * 2,
        (TuningScheme::Alternating, Suit::Clubs) => o * 2 + 1,
        (TuningScheme::Alternating, Suit::Diamonds) => 26 + o * 2,
        (TuningScheme::Alternating, Suit::Spades) => 26 + o * 2 + 1,

        (TuningScheme::PerfectFifths, Suit::Hearts) => o,
        (TuningScheme::PerfectFifths, Suit::Clubs) => 13 + o,
        (TuningScheme::PerfectFifths, Suit::Diamonds) => 31 + o,
        (TuningScheme::PerfectFifths, Suit::Spades) => 44 + o.min(8),

        (TuningScheme::MajorTriads, Suit::Hearts) => o * 4,
        (TuningScheme::MajorTriads, Suit::Clubs) => 1 + o * 4,
        (TuningScheme::MajorTriads, Suit::Diamonds) => 17 + o * 2,
        (TuningScheme::MajorTriads, Suit::Spades) => 31 + o,

        (TuningScheme::ChromaticBlocks, Suit::Hearts) => o,
        (TuningScheme::ChromaticBlocks, Suit::Diamonds) => 13 + o,
        (TuningScheme::ChromaticBlocks, Suit::Clubs) => 26 + o,
        (TuningScheme::ChromaticBlocks, Suit::Spades) => 39 + o.min(13),
    };

    ScaleStep(step)
}

/// Go Fish layout: each rank owns four adjacent steps, one per suit
pub fn go_fish_step(suit: Suit, rank: Rank) -> ScaleStep {
    match suit.index() {
        Some(offset) => ScaleStep((rank.value() as u16 - 1) * 4 + offset as u16),
        None => JOKER_STEP,
    }
}

/// Frequency of a raw step (may exceed the octave) above `fundamental_hz`
pub fn frequency_of(fundamental_hz: f64, raw_step: u16) -> f64 {
    fundamental_hz * 2f64.powf(raw_step as f64 / EDO as f64)
}

/// `fundamental_hz * 2^(step/53)`
pub fn step_frequency(fundamental_hz: f64, step: ScaleStep) -> f64 {
    frequency_of(fundamental_hz, step.value())
}

/// Snap a frequency to the nearest 53-EDO step relative to A440
pub fn snap_to_edo(freq_hz: f64) -> f64 {
    let steps = (EDO as f64 * (freq_hz / REFERENCE_HZ).log2()).round();
    REFERENCE_HZ * 2f64.powf(steps / EDO as f64)
}

/// Named accent intervals, for hosts that display them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccentInterval {
    Unison,
    MajorThird,
    PerfectFifth,
    MajorSeventh,
    Octave,
}

impl AccentInterval {
    pub fn of(step: ScaleStep) -> Option<Self> {
        match step.value() {
            0 => Some(Self::Unison),
            17 => Some(Self::MajorThird),
            31 => Some(Self::PerfectFifth),
            44 => Some(Self::MajorSeventh),
            53 => Some(Self::Octave),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unison => "Unison",
            Self::MajorThird => "Major 3rd",
            Self::PerfectFifth => "Perfect 5th",
            Self::MajorSeventh => "Major 7th",
            Self::Octave => "Octave",
        }
    }
}
