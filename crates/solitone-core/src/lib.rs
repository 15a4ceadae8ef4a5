//! solitone-core: Card-to-music domain logic for the SoliTone games

mod card;
pub mod cues;
mod error;
pub mod pitch;
pub mod scheduler;
pub mod sequencer;
mod settings;
pub mod swing;
pub mod tempo;
pub mod variation;

pub use card::{sort_reading_order, Card, CardId, CardLocation, CardSource, ListenMode, Rank, Suit, ROW_TOLERANCE};
pub use cues::{Cue, ScheduledTone};
pub use error::{Result, SoliToneError};
pub use pitch::{map_to_step, step_frequency, AccentInterval, ScaleStep, TuningScheme, EDO};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle};
pub use sequencer::{NoteRequest, NoteSink, Sequencer, SequencerState, StepKind, StepReport};
pub use settings::{AdjacencyRule, EngineSettings, GameProfile, TimbreMode, Waveform};
pub use swing::{SwingEffect, SwingPattern};
pub use tempo::{NoteValue, Tempo};
pub use variation::{DurationPattern, RestPattern};
