//! solitone-player: deals a Klondike table and plays it through the music engine

mod config;
mod layout;

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use config::PlayerConfig;
use layout::KlondikeLayout;
use solitone_core::{Cue, EngineSettings, ManualScheduler};
use solitone_services::{render_with, AudioContext, MusicEngine, TimerThread};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time left for release tails and the closing cue
const TAIL: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solitone_services=info".parse()?)
                .add_directive("solitone_player=info".parse()?),
        )
        .init();

    let mut config = config::load_config();
    if let Some(path) = std::env::args_os().nth(1) {
        config.output = Some(path.into());
    }

    let seed = config.seed.unwrap_or_else(|| fastrand::u64(..));
    let layout = KlondikeLayout::deal(&mut fastrand::Rng::with_seed(seed));
    let settings = config.engine_settings();
    tracing::info!(profile = config.profile.name(), seed, bpm = settings.bpm(), "dealt");

    match config.output.clone() {
        Some(path) => render_offline(&config, settings, seed, layout, &path),
        None => play_live(&config, settings, seed, layout),
    }
}

fn should_draw(config: &PlayerConfig, steps: usize) -> bool {
    config.draw_every > 0 && steps % config.draw_every == 0
}

fn play_live(config: &PlayerConfig, settings: EngineSettings, seed: u64, mut layout: KlondikeLayout) -> anyhow::Result<()> {
    let timer = TimerThread::spawn()?;
    let mut engine = MusicEngine::with_seed(timer, settings, seed);
    engine.attach_output().context("opening audio output")?;
    engine.start_loop(&layout);

    let deadline = Instant::now() + Duration::from_secs_f64(config.seconds.max(0.0));
    let mut steps = 0;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let Some(handle) = engine.scheduler().wait(remaining) else {
            continue;
        };
        if engine.on_timer(handle, &layout).is_some() {
            steps += 1;
            if should_draw(config, steps) && layout.draw() {
                engine.refresh_trigger_set(&layout);
            }
        }
    }

    engine.stop_loop();
    let released = engine.release_sustained();
    engine.play_cue(&Cue::Victory);
    tracing::info!(steps, released, "loop finished");
    thread::sleep(TAIL);
    Ok(())
}

fn render_offline(
    config: &PlayerConfig,
    settings: EngineSettings,
    seed: u64,
    mut layout: KlondikeLayout,
    path: &Path,
) -> anyhow::Result<()> {
    let context = AudioContext::offline(config.sample_rate);
    let mut engine = MusicEngine::with_seed(ManualScheduler::new(), settings, seed);
    engine.attach_context(context.clone());
    engine.start_loop(&layout);

    let loop_s = config.seconds.max(0.0);
    let mut steps = 0;
    let mut finished = false;
    let frames = render_with(&context, loop_s + TAIL.as_secs_f64(), config.channels, path, |now| {
        if finished {
            return;
        }
        if now >= loop_s {
            engine.stop_loop();
            engine.release_sustained();
            engine.play_cue(&Cue::Victory);
            finished = true;
            return;
        }
        let now = Duration::from_secs_f64(now);
        while engine.scheduler().next_due().is_some_and(|due| due <= now) {
            let Some(handle) = engine.scheduler_mut().fire_next() else { break };
            if engine.on_timer(handle, &layout).is_some() {
                steps += 1;
                if should_draw(config, steps) && layout.draw() {
                    engine.refresh_trigger_set(&layout);
                }
            }
        }
    })
    .with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(steps, frames, path = %path.display(), "render finished");
    Ok(())
}
