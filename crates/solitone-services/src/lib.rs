//! solitone-services: audio graph, synthesis, effects, timers and the music engine

pub mod audio_graph;
pub mod audio_io;
pub mod context;
pub mod effects_bus;
pub mod engine;
pub mod synth;
pub mod timer;
pub mod voice;
pub mod wav_writer;

pub use audio_graph::{AudioGraph, Automation, DelayLine, GraphVoice, ParamTimeline, VoiceId, VoiceSpec};
pub use audio_io::{default_device_info, AudioOutputError, OutputDeviceInfo, RealtimeOutputStream};
pub use context::AudioContext;
pub use effects_bus::EffectsBus;
pub use engine::{EngineError, MusicEngine};
pub use synth::ToneSynth;
pub use timer::{TimerError, TimerThread};
pub use voice::{SustainedVoices, Voice};
pub use wav_writer::{render_to_wav, render_with, WavError};
