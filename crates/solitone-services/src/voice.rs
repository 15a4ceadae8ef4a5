//! Live voices and the list of held ones awaiting release

use solitone_core::{ScaleStep, Waveform};

use crate::audio_graph::{AudioGraph, VoiceId};

/// Handle to a note the synthesizer started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub id: VoiceId,
    pub step: ScaleStep,
    /// Audio-clock start in seconds
    pub started_at: f64,
    pub waveform: Waveform,
    pub held: bool,
}

/// Held voices, oldest first
#[derive(Debug, Default)]
pub struct SustainedVoices {
    voices: Vec<Voice>,
}

impl SustainedVoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Forget voices the graph already stopped (auto-release ceiling)
    pub fn prune(&mut self, graph: &AudioGraph) {
        self.voices.retain(|v| graph.is_live(v.id));
    }

    pub fn take_all(&mut self) -> Vec<Voice> {
        std::mem::take(&mut self.voices)
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

impl Extend<Voice> for SustainedVoices {
    fn extend<I: IntoIterator<Item = Voice>>(&mut self, iter: I) {
        self.voices.extend(iter);
    }
}
