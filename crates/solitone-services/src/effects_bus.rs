//! Effects bus: the feedback delay and the sustain release path

use tracing::{debug, info};

use crate::context::AudioContext;
use crate::voice::SustainedVoices;

pub const DELAY_TIME_S: f64 = 0.3;
pub const DELAY_FEEDBACK: f32 = 0.4;
/// Feedback reached while held voices fade out
pub const RELEASE_FEEDBACK: f32 = 0.8;
pub const FADE_FLOOR: f32 = 0.001;
pub const FADE_S: f64 = 1.5;
/// Teardown/stop happens a little after the fade ends
pub const TEARDOWN_S: f64 = 1.6;

#[derive(Debug, Default)]
pub struct EffectsBus {
    delay_enabled: bool,
}

impl EffectsBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_delay_enabled(&self) -> bool {
        self.delay_enabled
    }

    /// Enable or disable the delay. Repeating the current state does nothing.
    /// Disabling fades the feedback out and tears the line down afterward;
    /// enabling during that fade keeps the line and restores the feedback.
    pub fn set_delay(&mut self, context: Option<&AudioContext>, enabled: bool) {
        if enabled == self.delay_enabled {
            return;
        }
        self.delay_enabled = enabled;
        info!(enabled, "delay toggled");
        if let Some(context) = context {
            self.apply_delay(context);
        }
    }

    /// Bring the graph in line with the current flag, e.g. after a context
    /// was attached while delay was already on
    pub fn apply_delay(&self, context: &AudioContext) {
        let enabled = self.delay_enabled;
        context.with_graph(|graph| {
            let now = graph.now();
            if !enabled {
                if let Some(delay) = graph.delay_mut().filter(|d| d.teardown_at().is_none()) {
                    delay.feedback.hold_at(now);
                    delay.feedback.exponential_ramp_to(FADE_FLOOR, now + FADE_S);
                    delay.schedule_teardown(now + TEARDOWN_S);
                }
                return;
            }
            match graph.delay_mut() {
                Some(delay) => {
                    delay.cancel_teardown();
                    delay.feedback.hold_at(now);
                    delay.feedback.set_value_at(DELAY_FEEDBACK, now);
                }
                None => {
                    graph.create_delay(DELAY_TIME_S, DELAY_FEEDBACK);
                }
            }
        });
    }

    /// Fade every tracked held voice out over 1.5 s, swelling the delay
    /// feedback meanwhile, then stop them. Returns how many were released.
    pub fn release_sustained(&self, context: Option<&AudioContext>, sustained: &mut SustainedVoices) -> usize {
        let voices = sustained.take_all();
        let Some(context) = context else {
            return 0;
        };
        if voices.is_empty() {
            return 0;
        }

        let delay_on = self.delay_enabled;
        let released = context
            .with_graph(|graph| {
                let now = graph.now();
                let mut count = 0;
                for voice in &voices {
                    if !graph.is_live(voice.id) {
                        continue;
                    }
                    if let Some(v) = graph.voice_mut(voice.id) {
                        v.gain.hold_at(now);
                        v.gain.exponential_ramp_to(FADE_FLOOR, now + FADE_S);
                    }
                    graph.stop_voice_at(voice.id, now + TEARDOWN_S);
                    count += 1;
                }
                if count > 0 && delay_on {
                    if let Some(delay) = graph.delay_mut() {
                        delay.feedback.hold_at(now);
                        delay.feedback.exponential_ramp_to(RELEASE_FEEDBACK, now + FADE_S);
                        delay.feedback.set_value_at(DELAY_FEEDBACK, now + TEARDOWN_S);
                    }
                }
                count
            })
            .unwrap_or(0);

        debug!(released, "sustained voices released");
        released
    }
}
