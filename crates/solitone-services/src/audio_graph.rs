//! Software mixing graph: oscillator voices with automated gain, a feedback
//! delay bus and a master limiter, rendered against a sample-accurate clock

use std::f64::consts::TAU;
use std::fmt;

use fundsp::hacker::*;
use solitone_core::Waveform;
use tracing::debug;

pub const LIMITER_ATTACK_S: f32 = 0.005;
pub const LIMITER_RELEASE_S: f32 = 0.1;

/// One scheduled change of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
}

impl Automation {
    pub fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. } | Self::LinearRamp { time, .. } | Self::ExponentialRamp { time, .. } => time,
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            Self::SetValue { value, .. } | Self::LinearRamp { value, .. } | Self::ExponentialRamp { value, .. } => value,
        }
    }
}

/// Automation timeline for a gain-like parameter.
///
/// A ramp runs from the previous event to its own end time. Exponential ramps
/// need both endpoints positive; otherwise the previous value holds until the
/// ramp ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTimeline {
    initial: f32,
    events: Vec<Automation>,
}

impl ParamTimeline {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: Automation) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(Automation::SetValue { time, value });
    }

    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(Automation::LinearRamp { time: end_time, value });
    }

    pub fn exponential_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(Automation::ExponentialRamp { time: end_time, value });
    }

    /// Drop everything scheduled from `time` on and pin the value there
    pub fn hold_at(&mut self, time: f64) {
        let value = self.value_at(time);
        self.events.retain(|e| e.time() < time);
        self.set_value_at(value, time);
    }

    pub fn events(&self) -> &[Automation] {
        &self.events
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time() <= t);
        let (prev_time, prev_value) = match idx.checked_sub(1) {
            Some(i) => (self.events[i].time(), self.events[i].value()),
            None => return self.initial,
        };

        match self.events.get(idx) {
            Some(&Automation::LinearRamp { time, value }) => {
                let frac = ((t - prev_time) / (time - prev_time)) as f32;
                prev_value + (value - prev_value) * frac
            }
            Some(&Automation::ExponentialRamp { time, value }) if prev_value > 0.0 && value > 0.0 => {
                let frac = ((t - prev_time) / (time - prev_time)) as f32;
                prev_value * (value / prev_value).powf(frac)
            }
            _ => prev_value,
        }
    }
}

/// Phase-accumulator oscillator
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn next_sample(&mut self, dt: f64) -> f32 {
        let p = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (p * TAU).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Sawtooth => {
                if p < 0.5 { 2.0 * p } else { 2.0 * p - 2.0 }
            }
            Waveform::Square => {
                if p < 0.5 { 1.0 } else { -1.0 }
            }
        };
        self.phase += self.frequency * dt;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        out as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// Everything needed to add a voice to the graph
#[derive(Debug, Clone)]
pub struct VoiceSpec {
    pub waveform: Waveform,
    pub frequency: f64,
    /// Audio-clock start time in seconds
    pub start: f64,
    pub stop: Option<f64>,
    pub gain: ParamTimeline,
    /// Also feed the delay bus
    pub delay_send: bool,
}

/// A live voice in the graph
#[derive(Debug, Clone)]
pub struct GraphVoice {
    id: VoiceId,
    osc: Oscillator,
    pub gain: ParamTimeline,
    start: f64,
    stop: Option<f64>,
    delay_send: bool,
}

impl GraphVoice {
    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn frequency(&self) -> f64 {
        self.osc.frequency()
    }

    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop
    }

    pub fn sends_to_delay(&self) -> bool {
        self.delay_send
    }

    pub fn is_finished(&self, now: f64) -> bool {
        self.stop.is_some_and(|s| now >= s)
    }

    fn sample(&mut self, t: f64, dt: f64) -> f32 {
        if t < self.start || self.is_finished(t) {
            return 0.0;
        }
        self.osc.next_sample(dt) * self.gain.value_at(t)
    }
}

/// Feedback delay: delayed output re-enters the line scaled by `feedback`
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
    delay_s: f64,
    pub feedback: ParamTimeline,
    teardown_at: Option<f64>,
}

impl DelayLine {
    pub fn new(delay_s: f64, feedback: f32, sample_rate: u32) -> Self {
        let delay_samples = Ord::max((delay_s * sample_rate as f64) as usize, 1);
        Self {
            buffer: vec![0.0; delay_samples + 1],
            write_pos: 0,
            delay_samples,
            delay_s,
            feedback: ParamTimeline::new(feedback),
            teardown_at: None,
        }
    }

    pub fn delay_s(&self) -> f64 {
        self.delay_s
    }

    pub fn teardown_at(&self) -> Option<f64> {
        self.teardown_at
    }

    pub fn schedule_teardown(&mut self, at: f64) {
        self.teardown_at = Some(at);
    }

    pub fn cancel_teardown(&mut self) {
        self.teardown_at = None;
    }

    fn process(&mut self, input: f32, t: f64) -> f32 {
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + delayed * self.feedback.value_at(t);
        self.write_pos = (self.write_pos + 1) % len;
        delayed
    }
}

impl fmt::Debug for DelayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayLine")
            .field("delay_s", &self.delay_s)
            .field("feedback", &self.feedback)
            .field("teardown_at", &self.teardown_at)
            .finish()
    }
}

/// The mixing graph behind an audio context
pub struct AudioGraph {
    sample_rate: u32,
    frames: u64,
    next_id: u64,
    voices: Vec<GraphVoice>,
    delay: Option<DelayLine>,
    limiter: An<Limiter<U1>>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        let mut limiter = limiter(LIMITER_ATTACK_S, LIMITER_RELEASE_S);
        limiter.set_sample_rate(sample_rate as f64);
        Self {
            sample_rate,
            frames: 0,
            next_id: 0,
            voices: Vec::new(),
            delay: None,
            limiter,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock in seconds (frames rendered / sample rate)
    pub fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn add_voice(&mut self, spec: VoiceSpec) -> VoiceId {
        self.next_id += 1;
        let id = VoiceId(self.next_id);
        self.voices.push(GraphVoice {
            id,
            osc: Oscillator::new(spec.waveform, spec.frequency),
            gain: spec.gain,
            start: spec.start,
            stop: spec.stop,
            delay_send: spec.delay_send,
        });
        id
    }

    pub fn voice(&self, id: VoiceId) -> Option<&GraphVoice> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> Option<&mut GraphVoice> {
        self.voices.iter_mut().find(|v| v.id == id)
    }

    pub fn voices(&self) -> &[GraphVoice] {
        &self.voices
    }

    /// Voice exists and has not reached its stop time
    pub fn is_live(&self, id: VoiceId) -> bool {
        let now = self.now();
        self.voice(id).is_some_and(|v| !v.is_finished(now))
    }

    /// Stop `id` at `at`, keeping an earlier stop if one is scheduled
    pub fn stop_voice_at(&mut self, id: VoiceId, at: f64) {
        if let Some(voice) = self.voice_mut(id) {
            voice.stop = Some(voice.stop.map_or(at, |s| s.min(at)));
        }
    }

    /// Immediate silence: every voice and the delay bus are dropped
    pub fn stop_all(&mut self) {
        debug!(voices = self.voices.len(), "graph hard stop");
        self.voices.clear();
        self.delay = None;
    }

    pub fn create_delay(&mut self, delay_s: f64, feedback: f32) -> &mut DelayLine {
        self.delay.insert(DelayLine::new(delay_s, feedback, self.sample_rate))
    }

    pub fn delay(&self) -> Option<&DelayLine> {
        self.delay.as_ref()
    }

    pub fn delay_mut(&mut self) -> Option<&mut DelayLine> {
        self.delay.as_mut()
    }

    /// Render interleaved frames. The mono mix is copied to every channel.
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = Ord::max(channels, 1);
        let dt = 1.0 / self.sample_rate as f64;

        for frame in buffer.chunks_mut(channels) {
            let t = self.frames as f64 * dt;
            let mut mix = 0.0f32;
            let mut send = 0.0f32;
            for voice in &mut self.voices {
                let s = voice.sample(t, dt);
                mix += s;
                if voice.delay_send {
                    send += s;
                }
            }
            if let Some(delay) = self.delay.as_mut() {
                mix += delay.process(send, t);
            }
            let out = self.limiter.tick(&Frame::from([mix]))[0];
            frame.fill(out);
            self.frames += 1;
        }

        self.prune();
    }

    fn prune(&mut self) {
        let now = self.now();
        self.voices.retain(|v| !v.is_finished(now));
        if self.delay.as_ref().and_then(|d| d.teardown_at).is_some_and(|t| now >= t) {
            debug!(at = now, "delay bus torn down");
            self.delay = None;
        }
    }
}

impl fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioGraph")
            .field("sample_rate", &self.sample_rate)
            .field("now", &self.now())
            .field("voices", &self.voices.len())
            .field("delay", &self.delay)
            .finish()
    }
}
