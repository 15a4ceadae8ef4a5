//! Music engine facade: the host-facing entry points tying the sequencer
//! to the synthesizer, effects bus and audio context

use solitone_core::{
    CardSource, Cue, EngineSettings, GameProfile, ListenMode, NoteRequest, NoteSink, Scheduler,
    Sequencer, SequencerState, StepReport, Suit, TimbreMode, TimerHandle, TuningScheme, Waveform,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::audio_io::{AudioOutputError, RealtimeOutputStream};
use crate::context::AudioContext;
use crate::effects_bus::EffectsBus;
use crate::synth::ToneSynth;
use crate::voice::SustainedVoices;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
    #[error("Audio output already attached")]
    AlreadyAttached,
}

/// Routes sequencer notes into the synthesizer and tracks held voices
struct GraphSink<'a> {
    synth: &'a ToneSynth,
    context: Option<&'a AudioContext>,
    delay_send: bool,
    sustained: &'a mut SustainedVoices,
}

impl NoteSink for GraphSink<'_> {
    fn play(&mut self, note: &NoteRequest) {
        if let Some(voice) = self.synth.play_note(self.context, note, self.delay_send) {
            if voice.held {
                if let Some(context) = self.context {
                    context.with_graph(|graph| self.sustained.prune(graph));
                }
                self.sustained.push(voice);
            }
        }
    }
}

pub struct MusicEngine<S: Scheduler> {
    settings: EngineSettings,
    sequencer: Sequencer,
    synth: ToneSynth,
    effects: EffectsBus,
    sustained: SustainedVoices,
    context: Option<AudioContext>,
    stream: Option<RealtimeOutputStream>,
    scheduler: S,
}

impl<S: Scheduler> MusicEngine<S> {
    pub fn new(scheduler: S, settings: EngineSettings) -> Self {
        Self::with_sequencer(scheduler, settings, Sequencer::new())
    }

    pub fn for_profile(scheduler: S, profile: GameProfile) -> Self {
        info!(profile = profile.name(), "engine configured");
        Self::new(scheduler, profile.settings())
    }

    /// Engine whose rhythm patterns come from a seeded generator
    pub fn with_seed(scheduler: S, settings: EngineSettings, seed: u64) -> Self {
        Self::with_sequencer(scheduler, settings, Sequencer::with_rng(fastrand::Rng::with_seed(seed)))
    }

    fn with_sequencer(scheduler: S, settings: EngineSettings, sequencer: Sequencer) -> Self {
        let settings = settings.sanitized();
        let mut effects = EffectsBus::new();
        effects.set_delay(None, settings.delay);
        Self {
            settings,
            sequencer,
            synth: ToneSynth::new(),
            effects,
            sustained: SustainedVoices::new(),
            context: None,
            stream: None,
            scheduler,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn is_running(&self) -> bool {
        self.sequencer.is_running()
    }

    /// Held voices still sounding; ones the hold ceiling already stopped
    /// are not counted
    pub fn sustained_count(&self) -> usize {
        match &self.context {
            Some(context) => context
                .with_graph(|graph| self.sustained.iter().filter(|v| graph.is_live(v.id)).count())
                .unwrap_or(0),
            None => self.sustained.len(),
        }
    }

    fn prune_sustained(&mut self) {
        if let Some(context) = &self.context {
            context.with_graph(|graph| self.sustained.prune(graph));
        }
    }

    /// Attach an audio context. Until one is attached every note is a
    /// silent no-op.
    pub fn attach_context(&mut self, context: AudioContext) {
        self.effects.apply_delay(&context);
        self.context = Some(context);
    }

    /// Lazily open the default output device and attach it
    pub fn attach_output(&mut self) -> Result<(), EngineError> {
        if self.context.is_some() {
            return Err(EngineError::AlreadyAttached);
        }
        let (context, stream) = AudioContext::realtime()?;
        info!(sample_rate = context.sample_rate(), "engine output attached");
        self.attach_context(context);
        self.stream = Some(stream);
        Ok(())
    }

    fn split_sink(&mut self) -> (&mut Sequencer, &EngineSettings, &mut S, GraphSink<'_>) {
        let sink = GraphSink {
            synth: &self.synth,
            context: self.context.as_ref(),
            delay_send: self.effects.is_delay_enabled(),
            sustained: &mut self.sustained,
        };
        (&mut self.sequencer, &self.settings, &mut self.scheduler, sink)
    }

    /// Snapshot the cards, play the first one and start ticking
    pub fn start_loop<C: CardSource + ?Sized>(&mut self, source: &C) -> StepReport {
        let (sequencer, settings, scheduler, mut sink) = self.split_sink();
        sequencer.start(source, settings, scheduler, &mut sink)
    }

    /// Stop ticking; notes already sounding ring out
    pub fn stop_loop(&mut self) {
        self.sequencer.stop(&mut self.scheduler);
    }

    /// Feed a fired timer handle back in. Stale handles are ignored.
    pub fn on_timer<C: CardSource + ?Sized>(&mut self, handle: TimerHandle, source: &C) -> Option<StepReport> {
        self.prune_sustained();
        let (sequencer, settings, scheduler, mut sink) = self.split_sink();
        sequencer.on_timer(handle, source, settings, scheduler, &mut sink)
    }

    /// Re-read the cards after the game state changed
    pub fn refresh_trigger_set<C: CardSource + ?Sized>(&mut self, source: &C) {
        self.sequencer.refresh_triggers(source, &self.settings);
    }

    pub fn set_swing(&mut self, enabled: bool) {
        self.settings.swing = enabled;
        self.sequencer.set_swing(&self.settings);
        debug!(enabled, "swing toggled");
    }

    pub fn set_delay(&mut self, enabled: bool) {
        self.settings.delay = enabled;
        self.effects.set_delay(self.context.as_ref(), enabled);
    }

    /// Fade out every held voice. Returns how many were released.
    pub fn release_sustained(&mut self) -> usize {
        self.effects.release_sustained(self.context.as_ref(), &mut self.sustained)
    }

    /// Turning sustain off releases what is currently held
    pub fn set_sustain(&mut self, enabled: bool) {
        let was = self.settings.sustain;
        self.settings.sustain = enabled;
        if was && !enabled {
            self.release_sustained();
        }
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.settings.set_bpm(bpm);
    }

    pub fn set_fundamental_hz(&mut self, hz: f64) {
        self.settings.set_fundamental_hz(hz);
    }

    pub fn set_tuning(&mut self, tuning: TuningScheme) {
        self.settings.tuning = tuning;
    }

    pub fn set_timbre(&mut self, timbre: TimbreMode) {
        self.settings.timbre = timbre;
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.settings.timbre = TimbreMode::Global { waveform };
    }

    pub fn set_auto_subdivision(&mut self, enabled: bool) {
        self.settings.tempo.auto_subdivision = enabled;
    }

    pub fn set_fundamental_harmony(&mut self, enabled: bool) {
        self.settings.fundamental_harmony = enabled;
    }

    pub fn set_rests(&mut self, enabled: bool) {
        self.settings.rests = enabled;
        self.sequencer.set_variations(&self.settings);
    }

    pub fn set_random_durations(&mut self, enabled: bool) {
        self.settings.random_durations = enabled;
        self.sequencer.set_variations(&self.settings);
    }

    /// Switch which face of the cards is heard; the loop restarts from the
    /// first card of the new set
    pub fn set_listen_mode<C: CardSource + ?Sized>(&mut self, mode: ListenMode, source: &C) {
        if mode == self.settings.listen {
            return;
        }
        self.settings.listen = mode;
        self.sequencer.reset_for_listen_mode(source, &self.settings);
        debug!(?mode, "listen mode changed");
    }

    /// Stop the loop and silence everything at once, delay tail included
    pub fn hard_stop(&mut self) {
        self.sequencer.stop(&mut self.scheduler);
        self.sustained.clear();
        if let Some(context) = &self.context {
            context.with_graph(|graph| graph.stop_all());
        }
        info!("hard stop");
    }

    /// Render a cue on top of whatever is playing. Returns the voices started.
    pub fn play_cue(&mut self, cue: &Cue) -> usize {
        let waveform = self.settings.waveform_for(Suit::Hearts);
        let fundamental = self.settings.fundamental_hz();
        let context = self.context.as_ref();
        let started = cue
            .tones(waveform)
            .iter()
            .filter_map(|tone| self.synth.play_tone(context, tone, fundamental))
            .count();
        debug!(?cue, started, "cue played");
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solitone_core::{Card, ManualScheduler, Rank, StepKind};

    fn cards() -> Vec<Card> {
        (0..5)
            .map(|i| Card::new(i, Suit::Spades, Rank::new(2 + 2 * i as u8).unwrap()).face_up(true).positioned(i as f32 * 80.0, 0.0))
            .collect()
    }

    fn engine() -> MusicEngine<ManualScheduler> {
        let mut engine = MusicEngine::with_seed(ManualScheduler::new(), EngineSettings::default(), 42);
        engine.attach_context(AudioContext::offline(8000));
        engine
    }

    #[test]
    fn test_start_and_tick_through_scheduler() {
        let cards = cards();
        let mut engine = engine();
        let first = engine.start_loop(&cards);
        assert_eq!(first.kind, StepKind::Normal);
        assert!(engine.is_running());

        let handle = engine.scheduler_mut().fire_next().unwrap();
        let next = engine.on_timer(handle, &cards).unwrap();
        assert_eq!(next.card, Some(cards[1].id));
        assert!(engine.context().unwrap().with_graph(|g| g.voices().len()).unwrap() >= 2);
    }

    #[test]
    fn test_no_context_still_sequences() {
        let cards = cards();
        let mut engine = MusicEngine::new(ManualScheduler::new(), EngineSettings::default());
        let report = engine.start_loop(&cards);
        assert_eq!(report.card, Some(cards[0].id));
        assert_eq!(engine.scheduler().pending(), 1);
    }

    #[test]
    fn test_sustain_tracks_and_releases() {
        let cards = cards();
        let mut engine = engine();
        engine.set_sustain(true);
        engine.start_loop(&cards);
        let handle = engine.scheduler_mut().fire_next().unwrap();
        engine.on_timer(handle, &cards);
        assert_eq!(engine.sustained_count(), 2);

        engine.set_sustain(false);
        assert_eq!(engine.sustained_count(), 0);
        assert_eq!(engine.release_sustained(), 0);
    }

    #[test]
    fn test_hold_ceiling_drops_sustained_entries() {
        let cards = cards();
        let mut engine = engine();
        engine.set_sustain(true);
        engine.start_loop(&cards);
        let handle = engine.scheduler_mut().fire_next().unwrap();
        engine.on_timer(handle, &cards);
        assert_eq!(engine.sustained_count(), 2);

        // past the 2 s ceiling every held voice has stopped on its own
        engine.context().unwrap().render_seconds(3.0, 1);
        assert_eq!(engine.sustained_count(), 0);

        let handle = engine.scheduler_mut().fire_next().unwrap();
        engine.on_timer(handle, &cards);
        assert_eq!(engine.sustained_count(), 1);
        assert_eq!(engine.sustained.len(), 1);
    }

    #[test]
    fn test_stop_keeps_sustained_voices() {
        let cards = cards();
        let mut engine = engine();
        engine.set_sustain(true);
        engine.start_loop(&cards);
        engine.stop_loop();
        assert_eq!(engine.state(), SequencerState::Stopped);
        assert_eq!(engine.sustained_count(), 1);
        assert_eq!(engine.scheduler().pending(), 0);
    }

    #[test]
    fn test_hard_stop_silences_graph() {
        let cards = cards();
        let mut engine = engine();
        engine.set_delay(true);
        engine.start_loop(&cards);
        engine.hard_stop();
        let ctx = engine.context().unwrap();
        assert_eq!(ctx.with_graph(|g| (g.voices().len(), g.delay().is_some())), Some((0, false)));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_delay_built_on_attach_when_preset_on() {
        let mut settings = EngineSettings::default();
        settings.delay = true;
        let mut engine = MusicEngine::new(ManualScheduler::new(), settings);
        let ctx = AudioContext::offline(8000);
        engine.attach_context(ctx.clone());
        assert_eq!(ctx.with_graph(|g| g.delay().is_some()), Some(true));
    }

    #[test]
    fn test_listen_mode_switch_restarts_cursor() {
        let mut cards = cards();
        cards.push(Card::new(9, Suit::Hearts, Rank::ACE));
        let mut engine = engine();
        engine.start_loop(&cards);
        engine.set_listen_mode(ListenMode::FaceDown, &cards);
        assert_eq!(engine.sequencer().cursor(), 0);
        assert_eq!(engine.sequencer().triggers().len(), 1);
    }

    #[test]
    fn test_cue_voices() {
        let mut engine = engine();
        assert_eq!(engine.play_cue(&Cue::Defeat), 5);
        let mut silent = MusicEngine::new(ManualScheduler::new(), EngineSettings::default());
        assert_eq!(silent.play_cue(&Cue::Defeat), 0);
    }
}
