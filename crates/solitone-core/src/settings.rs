//! Engine settings context and per-game presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::card::{ListenMode, Suit};
use crate::error::{Result, SoliToneError};
use crate::pitch::TuningScheme;
use crate::tempo::{BPM_DEFAULT, Tempo};

pub const FUNDAMENTAL_DEFAULT: f64 = 262.0;
pub const FUNDAMENTAL_MIN: f64 = 80.0;
pub const FUNDAMENTAL_MAX: f64 = 1500.0;

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth, Waveform::Square];

    /// Sine voices are louder and carry no extra partials
    pub fn is_sine(self) -> bool {
        self == Self::Sine
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sine => "sine",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
            Self::Square => "square",
        };
        f.write_str(name)
    }
}

impl FromStr for Waveform {
    type Err = SoliToneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sine" => Ok(Self::Sine),
            "triangle" => Ok(Self::Triangle),
            "sawtooth" | "saw" => Ok(Self::Sawtooth),
            "square" => Ok(Self::Square),
            _ => Err(SoliToneError::UnknownWaveform(s.to_string())),
        }
    }
}

/// Waveform selection: one for every card, or one per suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimbreMode {
    Global {
        waveform: Waveform,
    },
    PerSuit {
        hearts: Waveform,
        diamonds: Waveform,
        clubs: Waveform,
        spades: Waveform,
    },
}

impl Default for TimbreMode {
    fn default() -> Self {
        Self::PerSuit {
            hearts: Waveform::Sine,
            diamonds: Waveform::Sine,
            clubs: Waveform::Triangle,
            spades: Waveform::Triangle,
        }
    }
}

impl TimbreMode {
    /// Waveform for a card of `suit`. Jokers use the hearts voice.
    pub fn waveform_for(&self, suit: Suit) -> Waveform {
        match *self {
            Self::Global { waveform } => waveform,
            Self::PerSuit {
                hearts,
                diamonds,
                clubs,
                spades,
            } => match suit {
                Suit::Hearts | Suit::Joker => hearts,
                Suit::Diamonds => diamonds,
                Suit::Clubs => clubs,
                Suit::Spades => spades,
            },
        }
    }
}

/// Whether stock/waste cards may take part in a glissando
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyRule {
    pub exclude_reserve_piles: bool,
}

/// Deployment presets, one per game in the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameProfile {
    #[default]
    Solitaire,
    CardPickup,
    GoFish,
    War,
}

impl GameProfile {
    pub fn name(self) -> &'static str {
        match self {
            Self::Solitaire => "Solitaire",
            Self::CardPickup => "52 Card Pickup",
            Self::GoFish => "Go Fish",
            Self::War => "War",
        }
    }

    /// Settings a fresh engine starts with for this game
    pub fn settings(self) -> EngineSettings {
        let mut settings = EngineSettings::default();
        match self {
            Self::Solitaire => {
                settings.adjacency.exclude_reserve_piles = true;
            }
            Self::CardPickup => {
                // cards are scattered face up with no stock or waste
                settings.rests = true;
                settings.random_durations = true;
                settings.swing = true;
            }
            Self::GoFish => {
                settings.timbre = TimbreMode::Global {
                    waveform: Waveform::Triangle,
                };
            }
            Self::War => {
                settings.listen = ListenMode::FaceUp;
                settings.timbre = TimbreMode::Global {
                    waveform: Waveform::Sine,
                };
            }
        }
        settings
    }
}

/// Everything the engine reads when it plays a step. Owned by the engine
/// facade and passed to collaborators by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub tempo: Tempo,
    fundamental_hz: f64,
    pub tuning: TuningScheme,
    pub timbre: TimbreMode,
    pub listen: ListenMode,
    pub swing: bool,
    pub delay: bool,
    pub sustain: bool,
    /// Accented notes also sound the fundamental
    pub fundamental_harmony: bool,
    pub adjacency: AdjacencyRule,
    pub rests: bool,
    pub random_durations: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            fundamental_hz: FUNDAMENTAL_DEFAULT,
            tuning: TuningScheme::default(),
            timbre: TimbreMode::default(),
            listen: ListenMode::default(),
            swing: false,
            delay: false,
            sustain: false,
            fundamental_harmony: false,
            adjacency: AdjacencyRule::default(),
            rests: false,
            random_durations: false,
        }
    }
}

impl EngineSettings {
    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.tempo.set_bpm(bpm);
    }

    pub fn fundamental_hz(&self) -> f64 {
        self.fundamental_hz
    }

    /// Clamped to [`FUNDAMENTAL_MIN`, `FUNDAMENTAL_MAX`]; NaN is ignored
    pub fn set_fundamental_hz(&mut self, hz: f64) {
        if hz.is_nan() {
            return;
        }
        self.fundamental_hz = hz.clamp(FUNDAMENTAL_MIN, FUNDAMENTAL_MAX);
    }

    pub fn waveform_for(&self, suit: Suit) -> Waveform {
        self.timbre.waveform_for(suit)
    }

    /// Re-apply clamps after deserializing from an untrusted source
    pub fn sanitized(mut self) -> Self {
        let bpm = self.tempo.bpm();
        let auto_subdivision = self.tempo.auto_subdivision;
        self.tempo = Tempo::new(if bpm.is_nan() { BPM_DEFAULT } else { bpm });
        self.tempo.auto_subdivision = auto_subdivision;
        let hz = if self.fundamental_hz.is_nan() {
            FUNDAMENTAL_DEFAULT
        } else {
            self.fundamental_hz
        };
        self.fundamental_hz = FUNDAMENTAL_DEFAULT;
        self.set_fundamental_hz(hz);
        self
    }
}
