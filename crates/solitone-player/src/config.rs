use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use solitone_core::{EngineSettings, GameProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub profile: GameProfile,
    /// Replaces the profile preset entirely when present
    pub settings: Option<EngineSettings>,
    pub seconds: f64,
    /// Render to this WAV file instead of the sound card
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
    /// Steps between stock draws; 0 never draws
    pub draw_every: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            profile: GameProfile::Solitaire,
            settings: None,
            seconds: 30.0,
            output: None,
            seed: None,
            draw_every: 8,
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl PlayerConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        match &self.settings {
            Some(settings) => settings.clone().sanitized(),
            None => self.profile.settings(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solitone")
        .join("config.toml")
}

pub fn load_config() -> PlayerConfig {
    let path = config_path();
    let Ok(text) = std::fs::read_to_string(&path) else {
        return PlayerConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "bad config, using defaults");
            PlayerConfig::default()
        }
    }
}
