//! Rhythm variations: rest slots and random note lengths

use serde::{Deserialize, Serialize};

/// Fraction of slots that may become rests
pub const REST_RATIO: f64 = 0.2;

/// Beat divisors drawn for random note lengths
pub const DURATION_DIVISORS: [f64; 6] = [0.5, 1.0, 2.0, 4.0, 8.0, 16.0];

/// Length of a random duration pattern (one slot per 53-EDO step)
pub const DURATION_PATTERN_LEN: usize = 53;

/// Silent slots over one pass of the triggering cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestPattern {
    rests: Vec<bool>,
}

impl RestPattern {
    /// Up to `floor(len * 0.2)` rests at random slots (duplicates collapse)
    pub fn generate(len: usize, rng: &mut fastrand::Rng) -> Self {
        let mut rests = vec![false; len];
        let max_rests = (len as f64 * REST_RATIO).floor() as usize;
        for _ in 0..max_rests {
            rests[rng.usize(..len)] = true;
        }
        Self { rests }
    }

    pub fn is_rest(&self, idx: usize) -> bool {
        !self.rests.is_empty() && self.rests[idx % self.rests.len()]
    }

    pub fn rest_count(&self) -> usize {
        self.rests.iter().filter(|&&r| r).count()
    }

    pub fn len(&self) -> usize {
        self.rests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rests.is_empty()
    }
}

impl FromIterator<bool> for RestPattern {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            rests: iter.into_iter().collect(),
        }
    }
}

/// Random per-step beat divisors, replacing the adaptive subdivision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationPattern {
    divisors: Vec<f64>,
}

impl DurationPattern {
    pub fn generate(rng: &mut fastrand::Rng) -> Self {
        let divisors = (0..DURATION_PATTERN_LEN)
            .map(|_| DURATION_DIVISORS[rng.usize(..DURATION_DIVISORS.len())])
            .collect();
        Self { divisors }
    }

    pub fn divisor(&self, idx: usize) -> f64 {
        self.divisors[idx % self.divisors.len()]
    }

    /// Interval for a step: `60000 / bpm / divisor`
    pub fn interval_ms(&self, idx: usize, bpm: f64) -> f64 {
        60000.0 / bpm / self.divisor(idx)
    }
}
