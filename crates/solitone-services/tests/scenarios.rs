//! End-to-end runs of the engine against a manual clock and an offline context

use std::time::Duration;

use approx::assert_relative_eq;
use solitone_core::pitch::step_frequency;
use solitone_core::{
    AdjacencyRule, Card, CardLocation, EngineSettings, ManualScheduler, NoteRequest, Rank, ScaleStep, StepKind, Suit,
    TuningScheme, Waveform,
};
use solitone_services::{AudioContext, MusicEngine, ToneSynth};

fn deck(count: usize) -> Vec<Card> {
    Suit::RANKED
        .iter()
        .flat_map(|&suit| Rank::all().map(move |rank| (suit, rank)))
        .take(count)
        .enumerate()
        .map(|(i, (suit, rank))| {
            Card::new(i as u32, suit, rank)
                .face_up(true)
                .positioned((i % 13) as f32 * 80.0, (i / 13) as f32 * 120.0)
        })
        .collect()
}

fn engine(settings: EngineSettings) -> (MusicEngine<ManualScheduler>, AudioContext) {
    let mut engine = MusicEngine::with_seed(ManualScheduler::new(), settings, 7);
    let context = AudioContext::offline(8000);
    engine.attach_context(context.clone());
    (engine, context)
}

fn note(step: u16) -> NoteRequest {
    NoteRequest {
        step: ScaleStep::new(step).unwrap(),
        duration_s: 0.15,
        waveform: Waveform::Sine,
        accented: true,
        hold: false,
        offset_s: 0.0,
        fundamental_hz: 262.0,
        fundamental_harmony: false,
    }
}

#[test]
fn test_unison_plays_fundamental() {
    assert_relative_eq!(step_frequency(262.0, ScaleStep::UNISON), 262.0, epsilon = 1e-9);

    let mut settings = EngineSettings::default();
    settings.tuning = TuningScheme::ChromaticBlocks;
    let (mut engine, context) = engine(settings);
    // hearts two is step 0 under chromatic blocks
    let cards = vec![Card::new(0, Suit::Hearts, Rank::new(2).unwrap()).face_up(true)];
    let report = engine.start_loop(&cards);
    assert_eq!(report.step, Some(ScaleStep::UNISON));

    let freqs = context.with_graph(|g| g.voices().iter().map(|v| v.frequency()).collect::<Vec<_>>()).unwrap();
    assert!(!freqs.is_empty());
    assert!(freqs.iter().all(|f| (f - 262.0).abs() < 1e-9));
}

#[test]
fn test_octave_doubles_fundamental() {
    assert_relative_eq!(step_frequency(262.0, ScaleStep::OCTAVE), 524.0, epsilon = 1e-9);

    let context = AudioContext::offline(8000);
    let voice = ToneSynth::new().play_note(Some(&context), &note(53), false).unwrap();
    let freq = context.with_graph(|g| g.voice(voice.id).map(|v| v.frequency())).flatten().unwrap();
    assert_relative_eq!(freq, 524.0, epsilon = 1e-9);
}

#[test]
fn test_quarter_notes_below_first_threshold() {
    let cards = deck(10);
    let (mut engine, _) = engine(EngineSettings::default());
    let report = engine.start_loop(&cards);
    assert_relative_eq!(report.next_interval_ms, 60000.0 / 106.0, epsilon = 1e-9);
    assert_relative_eq!(report.next_interval_ms, 566.04, epsilon = 0.01);

    let delay = engine.scheduler().next_delay().unwrap();
    assert_relative_eq!(delay.as_secs_f64() * 1000.0, 566.04, epsilon = 0.01);
}

#[test]
fn test_thirty_seconds_once_fully_transitioned() {
    // the glide past 39 completes eight cards later
    for count in [47, 48] {
        let cards = deck(count);
        let (mut engine, _) = engine(EngineSettings::default());
        let report = engine.start_loop(&cards);
        assert_relative_eq!(report.next_interval_ms, 60000.0 / 106.0 / 8.0, epsilon = 1e-9);
        assert_relative_eq!(report.next_interval_ms, 70.75, epsilon = 0.01);
    }
}

#[test]
fn test_interval_tracks_card_count_between_ticks() {
    let mut cards = deck(10);
    let (mut engine, _) = engine(EngineSettings::default());
    engine.start_loop(&cards);

    cards.extend(deck(52).into_iter().skip(10).take(38));
    engine.refresh_trigger_set(&cards);
    let handle = engine.scheduler_mut().fire_next().unwrap();
    let report = engine.on_timer(handle, &cards).unwrap();
    assert_relative_eq!(report.next_interval_ms, 70.75, epsilon = 0.01);
}

#[test]
fn test_adjacent_steps_glide_together() {
    let mut settings = EngineSettings::default();
    settings.tuning = TuningScheme::ChromaticBlocks;
    settings.adjacency = AdjacencyRule { exclude_reserve_piles: true };
    let (mut engine, context) = engine(settings);

    let cards = vec![
        Card::new(1, Suit::Diamonds, Rank::new(6).unwrap()).face_up(true).positioned(0.0, 0.0),
        Card::new(2, Suit::Diamonds, Rank::new(7).unwrap()).face_up(true).positioned(100.0, 0.0),
    ];
    engine.start_loop(&cards);
    let handle = engine.scheduler_mut().fire_next().unwrap();
    let report = engine.on_timer(handle, &cards).unwrap();

    assert_eq!(report.kind, StepKind::Glissando { from: ScaleStep::new(17).unwrap() });
    assert_eq!(report.step, Some(ScaleStep::new(18).unwrap()));

    let long_voices = context
        .with_graph(|g| {
            g.voices()
                .iter()
                .filter(|v| v.stop_time().is_some_and(|t| t - v.start() > 1.0))
                .map(|v| v.frequency())
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(long_voices.len(), 2);
    assert_relative_eq!(long_voices[0], step_frequency(262.0, ScaleStep::new(17).unwrap()), epsilon = 1e-9);
    assert_relative_eq!(long_voices[1], step_frequency(262.0, ScaleStep::new(18).unwrap()), epsilon = 1e-9);
}

#[test]
fn test_reserve_pile_breaks_glide() {
    let mut settings = EngineSettings::default();
    settings.tuning = TuningScheme::ChromaticBlocks;
    settings.adjacency = AdjacencyRule { exclude_reserve_piles: true };
    let (mut engine, _) = engine(settings);

    let cards = vec![
        Card::new(1, Suit::Diamonds, Rank::new(6).unwrap()).face_up(true).positioned(0.0, 0.0),
        Card::new(2, Suit::Diamonds, Rank::new(7).unwrap())
            .face_up(true)
            .at(CardLocation::Waste)
            .positioned(100.0, 0.0),
    ];
    engine.start_loop(&cards);
    let handle = engine.scheduler_mut().fire_next().unwrap();
    assert_eq!(engine.on_timer(handle, &cards).unwrap().kind, StepKind::Normal);
}

#[test]
fn test_second_release_is_noop() {
    let (mut engine, context) = engine(EngineSettings::default());
    engine.set_sustain(true);
    let cards = deck(4);
    engine.start_loop(&cards);
    for _ in 0..2 {
        let handle = engine.scheduler_mut().fire_next().unwrap();
        engine.on_timer(handle, &cards);
    }
    assert_eq!(engine.sustained_count(), 3);
    assert_eq!(engine.release_sustained(), 3);
    assert_eq!(engine.release_sustained(), 0);

    context.render_seconds(1.7, 1);
    assert_eq!(context.with_graph(|g| g.voices().len()), Some(0));
}

#[test]
fn test_stale_tick_after_restart_is_ignored() {
    let cards = deck(5);
    let (mut engine, _) = engine(EngineSettings::default());
    engine.start_loop(&cards);
    let stale = engine.sequencer().pending_handle().unwrap();
    engine.stop_loop();
    engine.start_loop(&cards);
    assert!(engine.on_timer(stale, &cards).is_none());
    assert_eq!(engine.scheduler_mut().advance(Duration::from_secs(1)).len(), 1);
}
