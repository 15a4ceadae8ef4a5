//! Tone synthesizer: turns note requests into graph voices with envelopes

use solitone_core::pitch::{frequency_of, step_frequency};
use solitone_core::{NoteRequest, ScheduledTone, Waveform};
use tracing::{trace, warn};

use crate::audio_graph::{AudioGraph, ParamTimeline, VoiceId, VoiceSpec};
use crate::context::AudioContext;
use crate::voice::Voice;

pub const SINE_GAIN: f32 = 0.2;
pub const SHAPED_GAIN: f32 = 0.15;
pub const ACCENT_BOOST: f32 = 1.2;
pub const ACCENT_STRETCH: f64 = 1.05;
pub const ATTACK_S: f64 = 0.002;
/// Notes longer than this hold, then fade over `LONG_FADE_S`
pub const LONG_NOTE_S: f64 = 1.0;
pub const LONG_FADE_S: f64 = 0.5;
/// Held voices stop on their own after this long
pub const HOLD_CEILING_S: f64 = 2.0;

/// Partials added to non-sine voices: (step offset, gain)
pub const PARTIALS: [(u16, f32); 3] = [(17, 0.1), (26, 0.09), (31, 0.08)];
pub const PARTIAL_S: f64 = 0.1575;

pub const REVERB_DELAY_S: f64 = 0.1;
pub const REVERB_PEAK_S: f64 = 0.12;
pub const REVERB_END_S: f64 = 0.5;
pub const REVERB_GAIN: f32 = 0.1;
pub const FADE_FLOOR: f32 = 0.001;

pub const HARMONY_GAIN: f32 = 0.15;
pub const CUE_ATTACK_S: f64 = 0.005;

/// Base gain before accent
pub fn base_gain(waveform: Waveform) -> f32 {
    if waveform.is_sine() { SINE_GAIN } else { SHAPED_GAIN }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ToneSynth;

impl ToneSynth {
    pub fn new() -> Self {
        Self
    }

    /// Start one note. Without a context this is a silent no-op; a poisoned
    /// graph is logged and also yields `None`.
    pub fn play_note(&self, context: Option<&AudioContext>, request: &NoteRequest, delay_send: bool) -> Option<Voice> {
        let context = context?;
        let voice = context.with_graph(|graph| Self::build_note(graph, request, delay_send));
        if voice.is_none() {
            warn!(step = %request.step, "note dropped, graph unavailable");
        }
        voice
    }

    fn build_note(graph: &mut AudioGraph, request: &NoteRequest, delay_send: bool) -> Voice {
        let t0 = graph.now() + request.offset_s.max(0.0);
        let freq = step_frequency(request.fundamental_hz, request.step);
        let gain = if request.accented {
            base_gain(request.waveform) * ACCENT_BOOST
        } else {
            base_gain(request.waveform)
        };
        let duration = if request.accented {
            request.duration_s * ACCENT_STRETCH
        } else {
            request.duration_s
        };

        let mut envelope = ParamTimeline::new(0.0);
        envelope.set_value_at(0.0, t0);
        envelope.linear_ramp_to(gain, t0 + ATTACK_S);
        let stop = if request.hold {
            t0 + HOLD_CEILING_S
        } else {
            if duration > LONG_NOTE_S {
                envelope.set_value_at(gain, t0 + duration - LONG_FADE_S);
            }
            envelope.linear_ramp_to(0.0, t0 + duration);
            t0 + duration
        };

        let id = graph.add_voice(VoiceSpec {
            waveform: request.waveform,
            frequency: freq,
            start: t0,
            stop: Some(stop),
            gain: envelope,
            delay_send,
        });

        if request.accented {
            Self::add_reverb(graph, request.waveform, freq, t0);
            if request.fundamental_harmony {
                Self::add_decaying(graph, Waveform::Sine, request.fundamental_hz, t0, duration, HARMONY_GAIN);
            }
        }
        if !request.waveform.is_sine() {
            for (interval, partial_gain) in PARTIALS {
                let partial_freq = frequency_of(request.fundamental_hz, request.step.raw_offset(interval));
                Self::add_decaying(graph, request.waveform, partial_freq, t0, PARTIAL_S, partial_gain);
            }
        }

        trace!(step = %request.step, freq, duration, held = request.hold, "note");
        Voice {
            id,
            step: request.step,
            started_at: t0,
            waveform: request.waveform,
            held: request.hold,
        }
    }

    /// Quiet echo of an accented note
    fn add_reverb(graph: &mut AudioGraph, waveform: Waveform, freq: f64, t0: f64) {
        let start = t0 + REVERB_DELAY_S;
        let end = t0 + REVERB_END_S;
        let mut envelope = ParamTimeline::new(0.0);
        envelope.set_value_at(0.0, start);
        envelope.linear_ramp_to(REVERB_GAIN, t0 + REVERB_PEAK_S);
        envelope.exponential_ramp_to(FADE_FLOOR, end);
        graph.add_voice(VoiceSpec {
            waveform,
            frequency: freq,
            start,
            stop: Some(end),
            gain: envelope,
            delay_send: false,
        });
    }

    fn add_decaying(graph: &mut AudioGraph, waveform: Waveform, freq: f64, t0: f64, duration: f64, gain: f32) -> VoiceId {
        let mut envelope = ParamTimeline::new(0.0);
        envelope.set_value_at(gain, t0);
        envelope.linear_ramp_to(0.0, t0 + duration);
        graph.add_voice(VoiceSpec {
            waveform,
            frequency: freq,
            start: t0,
            stop: Some(t0 + duration),
            gain: envelope,
            delay_send: false,
        })
    }

    /// Render a cue tone with a short attack and a fixed gain
    pub fn play_tone(&self, context: Option<&AudioContext>, tone: &ScheduledTone, fundamental_hz: f64) -> Option<VoiceId> {
        let context = context?;
        context.with_graph(|graph| {
            let t0 = graph.now() + tone.offset_s;
            let mut envelope = ParamTimeline::new(0.0);
            envelope.set_value_at(0.0, t0);
            envelope.linear_ramp_to(tone.gain, t0 + CUE_ATTACK_S.min(tone.duration_s));
            graph.add_voice(VoiceSpec {
                waveform: tone.waveform,
                frequency: step_frequency(fundamental_hz, tone.step),
                start: t0,
                stop: Some(t0 + tone.duration_s),
                gain: envelope,
                delay_send: false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use solitone_core::ScaleStep;

    fn request(step: u16, waveform: Waveform) -> NoteRequest {
        NoteRequest {
            step: ScaleStep::new(step).unwrap(),
            duration_s: 0.15,
            waveform,
            accented: ScaleStep::new(step).unwrap().is_accented(),
            hold: false,
            offset_s: 0.0,
            fundamental_hz: 262.0,
            fundamental_harmony: false,
        }
    }

    #[test]
    fn test_no_context_is_silent_noop() {
        assert!(ToneSynth::new().play_note(None, &request(3, Waveform::Sine), false).is_none());
    }

    #[test]
    fn test_frequency_of_scale_steps() {
        let ctx = AudioContext::offline(8000);
        let synth = ToneSynth::new();
        let unison = synth.play_note(Some(&ctx), &request(0, Waveform::Sine), false).unwrap();
        let octave = synth.play_note(Some(&ctx), &request(53, Waveform::Sine), false).unwrap();
        ctx.with_graph(|g| {
            assert_relative_eq!(g.voice(unison.id).unwrap().frequency(), 262.0, epsilon = 1e-9);
            assert_relative_eq!(g.voice(octave.id).unwrap().frequency(), 524.0, epsilon = 1e-9);
        });
    }

    #[test]
    fn test_plain_sine_note_envelope() {
        let ctx = AudioContext::offline(8000);
        let voice = ToneSynth::new().play_note(Some(&ctx), &request(3, Waveform::Sine), true).unwrap();
        ctx.with_graph(|g| {
            assert_eq!(g.voices().len(), 1);
            let v = g.voice(voice.id).unwrap();
            assert!(v.sends_to_delay());
            assert_relative_eq!(v.gain.value_at(ATTACK_S), SINE_GAIN, epsilon = 1e-6);
            assert_relative_eq!(v.stop_time().unwrap(), 0.15);
            assert!(v.gain.value_at(0.14) < 0.02);
        });
    }

    #[test]
    fn test_accented_note_adds_reverb() {
        let ctx = AudioContext::offline(8000);
        let voice = ToneSynth::new().play_note(Some(&ctx), &request(17, Waveform::Sine), false).unwrap();
        ctx.with_graph(|g| {
            assert_eq!(g.voices().len(), 2);
            let main = g.voice(voice.id).unwrap();
            assert_relative_eq!(main.gain.value_at(ATTACK_S), SINE_GAIN * ACCENT_BOOST, epsilon = 1e-6);
            assert_relative_eq!(main.stop_time().unwrap(), 0.15 * ACCENT_STRETCH);
            let reverb = g.voices().iter().find(|v| v.id() != voice.id).unwrap();
            assert_relative_eq!(reverb.start(), REVERB_DELAY_S);
            assert_relative_eq!(reverb.gain.value_at(REVERB_PEAK_S), REVERB_GAIN, epsilon = 1e-6);
            assert_relative_eq!(reverb.stop_time().unwrap(), REVERB_END_S);
        });
    }

    #[test]
    fn test_shaped_waveform_adds_partials() {
        let ctx = AudioContext::offline(8000);
        let voice = ToneSynth::new().play_note(Some(&ctx), &request(3, Waveform::Triangle), false).unwrap();
        ctx.with_graph(|g| {
            assert_eq!(g.voices().len(), 4);
            assert_relative_eq!(g.voice(voice.id).unwrap().gain.value_at(ATTACK_S), SHAPED_GAIN, epsilon = 1e-6);
            let top = g.voices().iter().map(|v| v.frequency()).fold(0.0, f64::max);
            assert_relative_eq!(top, frequency_of(262.0, 34), epsilon = 1e-9);
        });
    }

    #[test]
    fn test_long_note_holds_then_fades() {
        let ctx = AudioContext::offline(8000);
        let mut req = request(3, Waveform::Sine);
        req.duration_s = 1.5;
        let voice = ToneSynth::new().play_note(Some(&ctx), &req, false).unwrap();
        ctx.with_graph(|g| {
            let v = g.voice(voice.id).unwrap();
            assert_relative_eq!(v.gain.value_at(0.9), SINE_GAIN, epsilon = 1e-6);
            assert_relative_eq!(v.gain.value_at(1.25), SINE_GAIN / 2.0, epsilon = 1e-6);
        });
    }

    #[test]
    fn test_held_note_has_ceiling_and_no_decay() {
        let ctx = AudioContext::offline(8000);
        let mut req = request(3, Waveform::Sine);
        req.hold = true;
        let voice = ToneSynth::new().play_note(Some(&ctx), &req, false).unwrap();
        assert!(voice.held);
        ctx.with_graph(|g| {
            let v = g.voice(voice.id).unwrap();
            assert_relative_eq!(v.stop_time().unwrap(), HOLD_CEILING_S);
            assert_relative_eq!(v.gain.value_at(1.9), SINE_GAIN, epsilon = 1e-6);
        });
    }

    #[test]
    fn test_offset_delays_start() {
        let ctx = AudioContext::offline(8000);
        let req = request(3, Waveform::Sine).delayed(0.025);
        let voice = ToneSynth::new().play_note(Some(&ctx), &req, false).unwrap();
        assert_relative_eq!(voice.started_at, 0.025);
    }

    #[test]
    fn test_fundamental_harmony_on_accents() {
        let ctx = AudioContext::offline(8000);
        let mut req = request(31, Waveform::Sine);
        req.fundamental_harmony = true;
        ToneSynth::new().play_note(Some(&ctx), &req, false);
        ctx.with_graph(|g| {
            assert_eq!(g.voices().len(), 3);
            assert!(g.voices().iter().any(|v| (v.frequency() - 262.0).abs() < 1e-9));
        });
    }
}
