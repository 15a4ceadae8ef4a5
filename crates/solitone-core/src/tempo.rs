//! Adaptive tempo: active card count to beat subdivision and step interval

use serde::{Deserialize, Serialize};

pub const BPM_DEFAULT: f64 = 106.0;
pub const BPM_MIN: f64 = 5.3;
pub const BPM_MAX: f64 = 530.0;

/// Card counts where the subdivision doubles
pub const THRESHOLDS: [usize; 3] = [13, 26, 39];

/// Counts past each threshold over which the division glides
pub const TRANSITION_SPAN: usize = 8;

/// Displayed note value for the current subdivision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteValue {
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteValue {
    /// Snapped note value for a card count (no interpolation)
    pub fn for_count(count: usize) -> Self {
        if count > THRESHOLDS[2] {
            Self::ThirtySecond
        } else if count > THRESHOLDS[1] {
            Self::Sixteenth
        } else if count > THRESHOLDS[0] {
            Self::Eighth
        } else {
            Self::Quarter
        }
    }

    pub fn division(self) -> f64 {
        match self {
            Self::Quarter => 4.0,
            Self::Eighth => 8.0,
            Self::Sixteenth => 16.0,
            Self::ThirtySecond => 32.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quarter => "\u{2669} 1/4",
            Self::Eighth => "\u{266A} 1/8",
            Self::Sixteenth => "\u{266A} 1/16",
            Self::ThirtySecond => "\u{266B} 1/32",
        }
    }
}

/// Beat division (4 = quarter notes) for `count` active cards.
///
/// Past each threshold the division glides linearly toward the next level
/// over `TRANSITION_SPAN` counts, then holds.
pub fn beat_division(count: usize) -> f64 {
    let mut division = 4.0;
    for &threshold in &THRESHOLDS {
        if count <= threshold {
            break;
        }
        let progress = ((count - threshold) as f64 / TRANSITION_SPAN as f64).min(1.0);
        division += division * progress;
        if progress < 1.0 {
            break;
        }
    }
    division
}

/// Milliseconds between steps: `60000 / bpm / (division / 4)`
pub fn interval_ms(count: usize, bpm: f64) -> f64 {
    60000.0 / bpm / (beat_division(count) / 4.0)
}

/// Quarter-note interval, used when auto subdivision is off
pub fn beat_ms(bpm: f64) -> f64 {
    60000.0 / bpm
}

/// Tempo control surface shared by the engine. Loaded values go through
/// the same clamp as [`Tempo::set_bpm`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TempoFields")]
pub struct Tempo {
    bpm: f64,
    /// Subdivision follows the active card count when enabled
    pub auto_subdivision: bool,
}

#[derive(Deserialize)]
#[serde(default)]
struct TempoFields {
    bpm: f64,
    auto_subdivision: bool,
}

impl Default for TempoFields {
    fn default() -> Self {
        let tempo = Tempo::default();
        Self {
            bpm: tempo.bpm,
            auto_subdivision: tempo.auto_subdivision,
        }
    }
}

impl From<TempoFields> for Tempo {
    fn from(fields: TempoFields) -> Self {
        let mut tempo = Tempo::new(fields.bpm);
        tempo.auto_subdivision = fields.auto_subdivision;
        tempo
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: BPM_DEFAULT,
            auto_subdivision: true,
        }
    }
}

impl Tempo {
    pub fn new(bpm: f64) -> Self {
        let mut tempo = Self::default();
        tempo.set_bpm(bpm);
        tempo
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Clamped to [`BPM_MIN`, `BPM_MAX`]; NaN is ignored
    pub fn set_bpm(&mut self, bpm: f64) {
        if bpm.is_nan() {
            return;
        }
        self.bpm = bpm.clamp(BPM_MIN, BPM_MAX);
    }

    /// Step interval for the current active card count
    pub fn interval_ms(&self, active_count: usize) -> f64 {
        if self.auto_subdivision {
            interval_ms(active_count, self.bpm)
        } else {
            beat_ms(self.bpm)
        }
    }

    pub fn note_value(&self, active_count: usize) -> NoteValue {
        if self.auto_subdivision {
            NoteValue::for_count(active_count)
        } else {
            NoteValue::Quarter
        }
    }

    /// Retry delay while there is nothing to play
    pub fn idle_ms(&self) -> f64 {
        beat_ms(self.bpm) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_division_bands() {
        assert_eq!(beat_division(0), 4.0);
        assert_eq!(beat_division(13), 4.0);
        assert_eq!(beat_division(14), 4.5);
        assert_eq!(beat_division(21), 8.0);
        assert_eq!(beat_division(26), 8.0);
        assert_eq!(beat_division(30), 12.0);
        assert_eq!(beat_division(39), 16.0);
        assert_eq!(beat_division(40), 18.0);
        assert_eq!(beat_division(47), 32.0);
        assert_eq!(beat_division(52), 32.0);
    }

    #[test]
    fn test_interval_monotonic_and_continuous() {
        let bpm = 106.0;
        for count in 0..60 {
            let a = interval_ms(count, bpm);
            let b = interval_ms(count + 1, bpm);
            assert!(b <= a, "interval rose from {count} to {}", count + 1);
        }
        // one count past a threshold moves the division by one eighth of the gap
        for &t in &THRESHOLDS {
            let before = beat_division(t);
            let after = beat_division(t + 1);
            assert_relative_eq!(after - before, before / TRANSITION_SPAN as f64);
        }
    }

    #[test]
    fn test_quarter_interval_below_threshold() {
        assert_relative_eq!(interval_ms(10, 106.0), 60000.0 / 106.0, epsilon = 1e-9);
        assert_relative_eq!(interval_ms(10, 106.0), 566.04, epsilon = 0.01);
    }

    #[test]
    fn test_fully_transitioned_interval() {
        assert_relative_eq!(interval_ms(47, 106.0), 60000.0 / 106.0 / 8.0, epsilon = 1e-9);
        assert_relative_eq!(interval_ms(48, 106.0), 70.75, epsilon = 0.01);
    }

    #[test]
    fn test_bpm_clamp() {
        let mut tempo = Tempo::default();
        tempo.set_bpm(1000.0);
        assert_eq!(tempo.bpm(), BPM_MAX);
        tempo.set_bpm(1.0);
        assert_eq!(tempo.bpm(), BPM_MIN);
        tempo.set_bpm(f64::NAN);
        assert_eq!(tempo.bpm(), BPM_MIN);
    }

    #[test]
    fn test_loaded_bpm_is_clamped() {
        let tempo: Tempo = toml::from_str("bpm = 0.0\nauto_subdivision = false\n").unwrap();
        assert_eq!(tempo.bpm(), BPM_MIN);
        assert!(!tempo.auto_subdivision);
        let tempo: Tempo = toml::from_str("bpm = 9000.0").unwrap();
        assert_eq!(tempo.bpm(), BPM_MAX);
        let tempo: Tempo = toml::from_str("").unwrap();
        assert_eq!(tempo, Tempo::default());
    }

    #[test]
    fn test_auto_subdivision_off_pins_quarter() {
        let mut tempo = Tempo::new(120.0);
        tempo.auto_subdivision = false;
        assert_relative_eq!(tempo.interval_ms(50), 500.0);
        assert_eq!(tempo.note_value(50), NoteValue::Quarter);
        tempo.auto_subdivision = true;
        assert_eq!(tempo.note_value(50), NoteValue::ThirtySecond);
        assert_relative_eq!(tempo.idle_ms(), 250.0);
    }
}
