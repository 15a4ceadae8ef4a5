//! Error types for solitone

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoliToneError {
    #[error("Invalid card rank: {0} (expected 1-13)")]
    InvalidRank(u8),
    #[error("Invalid scale step: {0} (expected 0-53)")]
    InvalidStep(u16),
    #[error("Unknown suit: {0}")]
    UnknownSuit(String),
    #[error("Unknown waveform: {0}")]
    UnknownWaveform(String),
}

pub type Result<T> = std::result::Result<T, SoliToneError>;
