//! Offline export of a context's output to a 16-bit WAV file

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::info;

use crate::context::AudioContext;

/// Small enough that timers driven between chunks land within a few ms
const FRAMES_PER_CHUNK: usize = 256;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV write failed: {0}")]
    Hound(#[from] hound::Error),
    #[error("Channel count must be at least 1")]
    NoChannels,
}

/// Render `seconds` of the graph into `path`. Rendering advances the
/// context clock, so anything scheduled meanwhile lands in the file.
pub fn render_to_wav(context: &AudioContext, seconds: f64, channels: u16, path: &Path) -> Result<u64, WavError> {
    render_with(context, seconds, channels, path, |_| {})
}

/// Like [`render_to_wav`], calling `between_chunks` with the context clock
/// before each chunk so the caller can drive timers at audio rate
pub fn render_with<F>(
    context: &AudioContext,
    seconds: f64,
    channels: u16,
    path: &Path,
    mut between_chunks: F,
) -> Result<u64, WavError>
where
    F: FnMut(f64),
{
    if channels == 0 {
        return Err(WavError::NoChannels);
    }
    let spec = WavSpec {
        channels,
        sample_rate: context.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let total_frames = (seconds.max(0.0) * context.sample_rate() as f64).round() as usize;
    let ch = channels as usize;
    let mut buffer = vec![0.0f32; FRAMES_PER_CHUNK * ch];
    let mut written = 0usize;

    while written < total_frames {
        between_chunks(context.current_time());
        let frames = (total_frames - written).min(FRAMES_PER_CHUNK);
        let chunk = &mut buffer[..frames * ch];
        context.render(chunk, ch);
        for &sample in chunk.iter() {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        written += frames;
    }
    writer.finalize()?;

    info!(path = %path.display(), frames = written, channels, "wav written");
    Ok(written as u64)
}
