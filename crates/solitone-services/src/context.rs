//! Shared audio context: the mixing graph plus where it renders to

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::audio_graph::AudioGraph;
use crate::audio_io::{default_device_info, AudioOutputError, RealtimeOutputStream};

pub const OFFLINE_SAMPLE_RATE: u32 = 44100;

/// Cheap-to-clone handle to one mixing graph. Engine code schedules into it
/// from the host thread; the output callback renders it.
#[derive(Debug, Clone)]
pub struct AudioContext {
    graph: Arc<Mutex<AudioGraph>>,
    sample_rate: u32,
}

impl AudioContext {
    /// Context rendered on demand by the caller (tests, WAV export)
    pub fn offline(sample_rate: u32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(AudioGraph::new(sample_rate))),
            sample_rate,
        }
    }

    /// Context wired to the default output device. The stream must be kept
    /// alive for as long as sound is wanted.
    pub fn realtime() -> Result<(Self, RealtimeOutputStream), AudioOutputError> {
        let device = default_device_info()?;
        let context = Self::offline(device.sample_rate);
        let graph = context.graph.clone();

        let stream = RealtimeOutputStream::start(move |buffer, channels| match graph.lock() {
            Ok(mut graph) => graph.render(buffer, channels),
            Err(_) => buffer.fill(0.0),
        })?;

        if stream.sample_rate() != device.sample_rate {
            warn!(
                expected = device.sample_rate,
                actual = stream.sample_rate(),
                "output device changed sample rate"
            );
        }
        info!(device = %device.name, sample_rate = device.sample_rate, "audio context opened");
        Ok((context, stream))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock in seconds; 0.0 if the graph lock is poisoned
    pub fn current_time(&self) -> f64 {
        self.graph.lock().map(|g| g.now()).unwrap_or(0.0)
    }

    /// Run `f` against the locked graph. `None` when the lock is poisoned.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> Option<R> {
        match self.graph.lock() {
            Ok(mut graph) => Some(f(&mut graph)),
            Err(_) => {
                warn!("audio graph lock poisoned");
                None
            }
        }
    }

    /// Render interleaved frames (offline use)
    pub fn render(&self, buffer: &mut [f32], channels: usize) {
        if self.with_graph(|g| g.render(buffer, channels)).is_none() {
            buffer.fill(0.0);
        }
    }

    /// Render `seconds` of audio and return it
    pub fn render_seconds(&self, seconds: f64, channels: usize) -> Vec<f32> {
        let frames = (seconds * self.sample_rate as f64).round() as usize;
        let mut buffer = vec![0.0; frames * channels.max(1)];
        self.render(&mut buffer, channels);
        buffer
    }
}

impl Default for AudioContext {
    fn default() -> Self {
        Self::offline(OFFLINE_SAMPLE_RATE)
    }
}
