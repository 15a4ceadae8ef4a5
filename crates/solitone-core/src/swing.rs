//! Swing/glitch timing patterns

use serde::{Deserialize, Serialize};

/// Multipliers at or below this render through the glitch path
pub const GLITCH_THRESHOLD: f64 = 0.3;

/// Effects placed per generated pattern (inclusive range)
pub const MIN_EFFECTS: usize = 2;
pub const MAX_EFFECTS: usize = 6;

/// One perturbation type. All six are equally likely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingEffect {
    SlightDelay,
    Rush,
    ModerateDelay,
    TripletFeel,
    DjCut,
    StutterRepeat,
}

impl SwingEffect {
    pub const ALL: [SwingEffect; 6] = [
        SwingEffect::SlightDelay,
        SwingEffect::Rush,
        SwingEffect::ModerateDelay,
        SwingEffect::TripletFeel,
        SwingEffect::DjCut,
        SwingEffect::StutterRepeat,
    ];

    /// Multipliers written from the chosen slot onward
    pub fn multipliers(self) -> &'static [f64] {
        match self {
            Self::SlightDelay => &[1.15],
            Self::Rush => &[0.85],
            Self::ModerateDelay => &[1.25],
            Self::TripletFeel => &[1.3, 0.7],
            Self::DjCut => &[0.25, 0.25, 0.25, 0.25],
            Self::StutterRepeat => &[0.3, 0.3, 0.8],
        }
    }

    pub fn pick(rng: &mut fastrand::Rng) -> Self {
        Self::ALL[rng.usize(..Self::ALL.len())]
    }
}

/// Per-step interval multipliers for one pass over the triggering cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingPattern {
    multipliers: Vec<f64>,
}

impl SwingPattern {
    /// Straight pattern: every slot 1.0
    pub fn straight(len: usize) -> Self {
        Self { multipliers: vec![1.0; len] }
    }

    /// Straight pattern with 2-6 random effects layered on. Later effects
    /// overwrite earlier ones; writes past the end are dropped.
    pub fn generate(len: usize, rng: &mut fastrand::Rng) -> Self {
        let mut pattern = Self::straight(len);
        if len == 0 {
            return pattern;
        }
        let count = rng.usize(MIN_EFFECTS..=MAX_EFFECTS);
        for _ in 0..count {
            let pos = rng.usize(..len);
            pattern.apply(pos, SwingEffect::pick(rng));
        }
        pattern
    }

    pub fn apply(&mut self, pos: usize, effect: SwingEffect) {
        for (slot, &m) in self.multipliers.iter_mut().skip(pos).zip(effect.multipliers()) {
            *slot = m;
        }
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    /// Multiplier for a slot, wrapping; 1.0 for an empty pattern
    pub fn multiplier(&self, idx: usize) -> f64 {
        if self.multipliers.is_empty() {
            return 1.0;
        }
        self.multipliers[idx % self.multipliers.len()]
    }

    pub fn is_glitch(&self, idx: usize) -> bool {
        !self.multipliers.is_empty() && self.multiplier(idx) <= GLITCH_THRESHOLD
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_matches_request() {
        let mut rng = fastrand::Rng::with_seed(7);
        for len in [0, 1, 3, 13, 52] {
            assert_eq!(SwingPattern::generate(len, &mut rng).len(), len);
        }
    }

    #[test]
    fn test_glitch_slots_are_fast() {
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..200 {
            let pattern = SwingPattern::generate(20, &mut rng);
            for idx in 0..pattern.len() {
                if pattern.is_glitch(idx) {
                    assert!(pattern.multiplier(idx) <= GLITCH_THRESHOLD);
                }
            }
            let known = [1.0, 1.15, 0.85, 1.25, 1.3, 0.7, 0.25, 0.3, 0.8];
            assert!(pattern.multipliers().iter().all(|m| known.contains(m)));
        }
    }

    #[test]
    fn test_untouched_slots_are_straight() {
        let mut pattern = SwingPattern::straight(10);
        pattern.apply(2, SwingEffect::TripletFeel);
        assert_eq!(pattern.multipliers(), &[1.0, 1.0, 1.3, 0.7, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_effects_truncate_at_end() {
        let mut pattern = SwingPattern::straight(3);
        pattern.apply(1, SwingEffect::DjCut);
        assert_eq!(pattern.multipliers(), &[1.0, 0.25, 0.25]);
        assert!(pattern.is_glitch(1));
        assert!(!pattern.is_glitch(0));
    }

    #[test]
    fn test_stutter_marks_two_glitches_then_pause() {
        let mut pattern = SwingPattern::straight(5);
        pattern.apply(0, SwingEffect::StutterRepeat);
        assert!(pattern.is_glitch(0) && pattern.is_glitch(1));
        assert!(!pattern.is_glitch(2));
        assert_eq!(pattern.multiplier(2), 0.8);
    }

    #[test]
    fn test_generated_pattern_perturbs_something() {
        let mut rng = fastrand::Rng::with_seed(3);
        let pattern = SwingPattern::generate(40, &mut rng);
        assert!(pattern.multipliers().iter().any(|&m| m != 1.0));
    }

    #[test]
    fn test_empty_pattern_is_neutral() {
        let pattern = SwingPattern::default();
        assert_eq!(pattern.multiplier(5), 1.0);
        assert!(!pattern.is_glitch(0));
    }
}
