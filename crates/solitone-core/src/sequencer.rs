//! Sequencer loop: walks the triggering cards in reading order, one note per tick

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::card::{sort_reading_order, Card, CardId, CardSource};
use crate::pitch::{map_to_step, AccentInterval, ScaleStep};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::settings::{AdjacencyRule, EngineSettings, Waveform};
use crate::swing::SwingPattern;
use crate::variation::{DurationPattern, RestPattern};

/// Length of a plain step note
pub const STEP_NOTE_S: f64 = 0.15;
/// Length of both notes of a glissando
pub const GLISSANDO_NOTE_S: f64 = 1.5;
/// Length of glitch notes
pub const GLITCH_NOTE_S: f64 = 0.05;
/// Delay between the echoed and the current glitch note
pub const GLITCH_ECHO_OFFSET_S: f64 = 0.025;

/// One note for the synthesizer to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    pub step: ScaleStep,
    pub duration_s: f64,
    pub waveform: Waveform,
    pub accented: bool,
    /// Held in the sustained list instead of decaying
    pub hold: bool,
    /// Start offset from "now" on the audio clock
    pub offset_s: f64,
    pub fundamental_hz: f64,
    /// Accented notes also sound the fundamental
    pub fundamental_harmony: bool,
}

impl NoteRequest {
    /// Request for `step` voiced with the card's suit under `settings`
    pub fn for_card(step: ScaleStep, card: &Card, duration_s: f64, settings: &EngineSettings) -> Self {
        Self {
            step,
            duration_s,
            waveform: settings.waveform_for(card.suit),
            accented: step.is_accented(),
            hold: settings.sustain,
            offset_s: 0.0,
            fundamental_hz: settings.fundamental_hz(),
            fundamental_harmony: settings.fundamental_harmony,
        }
    }

    pub fn delayed(mut self, offset_s: f64) -> Self {
        self.offset_s = offset_s;
        self
    }
}

/// Receives the notes the sequencer decides to play
pub trait NoteSink {
    fn play(&mut self, note: &NoteRequest);
}

impl NoteSink for Vec<NoteRequest> {
    fn play(&mut self, note: &NoteRequest) {
        self.push(*note);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequencerState {
    #[default]
    Stopped,
    Running,
}

/// Which path a tick took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Normal,
    /// Previous and current step re-played together
    Glissando { from: ScaleStep },
    /// Short glitch note, optionally echoing the previous one first
    Glitch { echoed: bool },
    /// Silent slot; the cursor still advanced
    Rest,
    /// Nothing to play; a re-check is scheduled
    Idle,
}

/// What a tick did, for hosts that highlight the playing card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub kind: StepKind,
    pub card: Option<CardId>,
    pub step: Option<ScaleStep>,
    pub accent: Option<AccentInterval>,
    /// Delay until the next tick
    pub next_interval_ms: f64,
}

impl StepReport {
    fn idle(next_interval_ms: f64) -> Self {
        Self {
            kind: StepKind::Idle,
            card: None,
            step: None,
            accent: None,
            next_interval_ms,
        }
    }
}

/// Two consecutive cards form a glissando when their steps are one apart,
/// they share a face state, and (under the rule) neither sits in a reserve pile
pub fn is_glissando(prev: (ScaleStep, &Card), current: (ScaleStep, &Card), rule: AdjacencyRule) -> bool {
    let (prev_step, prev_card) = prev;
    let (step, card) = current;
    if !step.is_adjacent(prev_step) || card.face_up != prev_card.face_up {
        return false;
    }
    !(rule.exclude_reserve_piles && (card.is_reserve() || prev_card.is_reserve()))
}

#[derive(Debug, Clone, Copy)]
struct PendingTick {
    handle: TimerHandle,
    glitch: bool,
}

/// The loop itself. Owns cursor, cached triggers and the rhythm patterns;
/// everything else (settings, timer, card source, synth) is passed in.
#[derive(Debug)]
pub struct Sequencer {
    state: SequencerState,
    triggers: Vec<Card>,
    cursor: usize,
    last: Option<(ScaleStep, Card)>,
    swing: SwingPattern,
    swing_idx: usize,
    rests: RestPattern,
    durations: Option<DurationPattern>,
    pending: Option<PendingTick>,
    rng: fastrand::Rng,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequencer with a seeded generator for reproducible patterns
    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            state: SequencerState::Stopped,
            triggers: Vec::new(),
            cursor: 0,
            last: None,
            swing: SwingPattern::default(),
            swing_idx: 0,
            rests: RestPattern::default(),
            durations: None,
            pending: None,
            rng,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SequencerState::Running
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cached triggering cards in reading order
    pub fn triggers(&self) -> &[Card] {
        &self.triggers
    }

    pub fn swing_pattern(&self) -> &SwingPattern {
        &self.swing
    }

    pub fn rest_pattern(&self) -> &RestPattern {
        &self.rests
    }

    pub fn pending_handle(&self) -> Option<TimerHandle> {
        self.pending.map(|p| p.handle)
    }

    /// Snapshot triggers, play step 0 right away and schedule the next tick
    pub fn start<C, S>(
        &mut self,
        source: &C,
        settings: &EngineSettings,
        scheduler: &mut S,
        sink: &mut dyn NoteSink,
    ) -> StepReport
    where
        C: CardSource + ?Sized,
        S: Scheduler + ?Sized,
    {
        self.cancel_pending(scheduler);
        self.snapshot(source, settings);
        self.last = None;
        self.swing_idx = 0;
        self.regenerate_patterns(settings);
        self.state = SequencerState::Running;
        debug!(triggers = self.triggers.len(), bpm = settings.bpm(), "sequencer started");

        if self.triggers.is_empty() {
            return self.schedule_idle(settings, scheduler);
        }
        let report = self.play_normal(settings, sink);
        self.finish_tick(report, source, settings, scheduler)
    }

    /// Cancel the pending tick only; sounding voices keep ringing
    pub fn stop<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        self.cancel_pending(scheduler);
        self.state = SequencerState::Stopped;
        debug!(cursor = self.cursor, "sequencer stopped");
    }

    /// Handle a fired timer. Stale or foreign handles return `None`.
    pub fn on_timer<C, S>(
        &mut self,
        handle: TimerHandle,
        source: &C,
        settings: &EngineSettings,
        scheduler: &mut S,
        sink: &mut dyn NoteSink,
    ) -> Option<StepReport>
    where
        C: CardSource + ?Sized,
        S: Scheduler + ?Sized,
    {
        let pending = self.pending.filter(|p| p.handle == handle)?;
        self.pending = None;
        if !self.is_running() {
            return None;
        }

        if self.triggers.is_empty() {
            // self-heal: the collaborator may have dealt new cards
            self.snapshot(source, settings);
            self.regenerate_patterns(settings);
            if self.triggers.is_empty() {
                return Some(self.schedule_idle(settings, scheduler));
            }
        }

        let report = if pending.glitch {
            self.play_glitch(settings, sink)
        } else {
            self.play_normal(settings, sink)
        };
        Some(self.finish_tick(report, source, settings, scheduler))
    }

    /// Re-read the collaborator after a game move. The swing pattern is
    /// regenerated when the set size changed and swing is on.
    pub fn refresh_triggers<C: CardSource + ?Sized>(&mut self, source: &C, settings: &EngineSettings) {
        let before = self.triggers.len();
        self.snapshot(source, settings);
        if self.triggers.len() != before {
            self.regenerate_patterns(settings);
        }
    }

    /// Listen mode flipped: start over from the first card of the new set
    pub fn reset_for_listen_mode<C: CardSource + ?Sized>(&mut self, source: &C, settings: &EngineSettings) {
        self.cursor = 0;
        self.last = None;
        self.snapshot(source, settings);
        self.regenerate_patterns(settings);
    }

    /// Swing toggled. A fresh pattern is drawn when it turns on.
    pub fn set_swing(&mut self, settings: &EngineSettings) {
        self.swing_idx = 0;
        if settings.swing {
            self.swing = SwingPattern::generate(self.triggers.len(), &mut self.rng);
        } else {
            self.swing = SwingPattern::default();
        }
    }

    /// Rest/duration variations toggled
    pub fn set_variations(&mut self, settings: &EngineSettings) {
        self.regenerate_patterns(settings);
    }

    fn snapshot<C: CardSource + ?Sized>(&mut self, source: &C, settings: &EngineSettings) {
        let mut cards = source.triggering_cards(settings.listen);
        sort_reading_order(&mut cards);
        self.triggers = cards;
    }

    fn regenerate_patterns(&mut self, settings: &EngineSettings) {
        let len = self.triggers.len();
        self.swing = if settings.swing {
            SwingPattern::generate(len, &mut self.rng)
        } else {
            SwingPattern::default()
        };
        self.rests = if settings.rests {
            RestPattern::generate(len, &mut self.rng)
        } else {
            RestPattern::default()
        };
        self.durations = match (settings.random_durations, self.durations.take()) {
            (true, Some(existing)) => Some(existing),
            (true, None) => Some(DurationPattern::generate(&mut self.rng)),
            (false, _) => None,
        };
    }

    fn cancel_pending<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(pending) = self.pending.take() {
            scheduler.cancel(pending.handle);
        }
    }

    fn current(&self, settings: &EngineSettings) -> Option<(usize, ScaleStep, Card)> {
        if self.triggers.is_empty() {
            return None;
        }
        let slot = self.cursor % self.triggers.len();
        let card = self.triggers[slot].clone();
        let step = map_to_step(card.suit, card.rank, settings.tuning);
        Some((slot, step, card))
    }

    fn play_normal(&mut self, settings: &EngineSettings, sink: &mut dyn NoteSink) -> StepReport {
        let Some((slot, step, card)) = self.current(settings) else {
            return StepReport::idle(0.0);
        };
        self.cursor += 1;

        let mut report = StepReport {
            kind: StepKind::Normal,
            card: Some(card.id),
            step: Some(step),
            accent: AccentInterval::of(step),
            next_interval_ms: 0.0,
        };

        if settings.rests && self.rests.is_rest(slot) {
            report.kind = StepKind::Rest;
            trace!(slot, "rest");
            return report;
        }

        let glissando = self
            .last
            .as_ref()
            .filter(|(prev_step, prev_card)| is_glissando((*prev_step, prev_card), (step, &card), settings.adjacency));

        if let Some((prev_step, prev_card)) = glissando {
            sink.play(&NoteRequest::for_card(*prev_step, prev_card, GLISSANDO_NOTE_S, settings));
            sink.play(&NoteRequest::for_card(step, &card, GLISSANDO_NOTE_S, settings));
            report.kind = StepKind::Glissando { from: *prev_step };
        } else {
            sink.play(&NoteRequest::for_card(step, &card, STEP_NOTE_S, settings));
        }

        self.last = Some((step, card));
        report
    }

    fn play_glitch(&mut self, settings: &EngineSettings, sink: &mut dyn NoteSink) -> StepReport {
        let Some((slot, step, card)) = self.current(settings) else {
            return StepReport::idle(0.0);
        };
        self.cursor += 1;

        // a rest slot stays silent even when swing lands a glitch on it
        if settings.rests && self.rests.is_rest(slot) {
            trace!(slot, "rest over glitch");
            return StepReport {
                kind: StepKind::Rest,
                card: Some(card.id),
                step: Some(step),
                accent: AccentInterval::of(step),
                next_interval_ms: 0.0,
            };
        }

        let echoed = self.rng.bool() && self.last.is_some();
        match self.last.as_ref().filter(|_| echoed) {
            Some((prev_step, prev_card)) => {
                sink.play(&NoteRequest::for_card(*prev_step, prev_card, GLITCH_NOTE_S, settings));
                sink.play(&NoteRequest::for_card(step, &card, GLITCH_NOTE_S, settings).delayed(GLITCH_ECHO_OFFSET_S));
            }
            None => sink.play(&NoteRequest::for_card(step, &card, GLITCH_NOTE_S, settings)),
        }

        let report = StepReport {
            kind: StepKind::Glitch { echoed },
            card: Some(card.id),
            step: Some(step),
            accent: AccentInterval::of(step),
            next_interval_ms: 0.0,
        };
        self.last = Some((step, card));
        report
    }

    /// Interval for the upcoming tick and whether it takes the glitch path
    fn next_interval<C: CardSource + ?Sized>(&mut self, source: &C, settings: &EngineSettings) -> (f64, bool) {
        let mut interval = match &self.durations {
            Some(durations) if settings.random_durations => durations.interval_ms(self.cursor, settings.bpm()),
            _ => settings.tempo.interval_ms(source.active_card_count(settings.listen)),
        };
        let mut glitch = false;
        if settings.swing && !self.swing.is_empty() {
            interval *= self.swing.multiplier(self.swing_idx);
            glitch = self.swing.is_glitch(self.swing_idx);
            self.swing_idx += 1;
        }
        (interval, glitch)
    }

    fn finish_tick<C, S>(
        &mut self,
        mut report: StepReport,
        source: &C,
        settings: &EngineSettings,
        scheduler: &mut S,
    ) -> StepReport
    where
        C: CardSource + ?Sized,
        S: Scheduler + ?Sized,
    {
        let (interval, glitch) = self.next_interval(source, settings);
        let handle = scheduler.schedule(Duration::from_secs_f64(interval / 1000.0));
        self.pending = Some(PendingTick { handle, glitch });
        report.next_interval_ms = interval;
        trace!(cursor = self.cursor, interval_ms = interval, glitch, "tick scheduled");
        report
    }

    fn schedule_idle<S: Scheduler + ?Sized>(&mut self, settings: &EngineSettings, scheduler: &mut S) -> StepReport {
        let interval = settings.tempo.idle_ms();
        let handle = scheduler.schedule(Duration::from_secs_f64(interval / 1000.0));
        self.pending = Some(PendingTick { handle, glitch: false });
        StepReport::idle(interval)
    }
}
