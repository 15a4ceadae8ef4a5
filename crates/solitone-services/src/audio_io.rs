//! Real-time audio output through the default cpal device

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig, SupportedStreamConfig};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output device available")]
    NoDevice,
    #[error("Default output config unavailable: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("Unsupported output sample format: {0:?}")]
    Format(SampleFormat),
    #[error("Failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("Failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Name and native format of the default output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

fn default_output() -> Result<(Device, SupportedStreamConfig), AudioOutputError> {
    let device = cpal::default_host().default_output_device().ok_or(AudioOutputError::NoDevice)?;
    let config = device.default_output_config()?;
    Ok((device, config))
}

/// Query the default output device without opening a stream
pub fn default_device_info() -> Result<OutputDeviceInfo, AudioOutputError> {
    let (device, config) = default_output()?;
    Ok(OutputDeviceInfo {
        name: device.name().unwrap_or_default(),
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

/// Open output stream. The renderer fills interleaved f32 frames and the
/// stream converts to whatever the device wants.
pub struct RealtimeOutputStream {
    muted: Arc<AtomicBool>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    /// Open the default device and start pulling from `render(buffer, channels)`
    pub fn start<F>(render: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], usize) + Send + 'static,
    {
        let (device, supported) = default_output()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let muted = Arc::new(AtomicBool::new(false));

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32, F>(&device, &config, render, muted.clone())?,
            SampleFormat::I16 => build_stream::<i16, F>(&device, &config, render, muted.clone())?,
            SampleFormat::U16 => build_stream::<u16, F>(&device, &config, render, muted.clone())?,
            other => return Err(AudioOutputError::Format(other)),
        };
        stream.play()?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            ?format,
            "output stream started"
        );
        Ok(Self {
            muted,
            sample_rate,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.muted.store(true, Ordering::Relaxed);
    }
}

fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    mut render: F,
    muted: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioOutputError>
where
    T: SizedSample + FromSample<f32>,
    F: FnMut(&mut [f32], usize) + Send + 'static,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if muted.load(Ordering::Relaxed) {
                data.fill(T::EQUILIBRIUM);
                return;
            }
            if scratch.len() != data.len() {
                // first callback or the host changed its buffer size
                scratch.resize(data.len(), 0.0);
            }
            render(&mut scratch, channels);
            for (out, &s) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(s);
            }
        },
        |err| error!(%err, "output stream error"),
        None,
    )?;
    Ok(stream)
}
