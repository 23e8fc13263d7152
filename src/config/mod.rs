// Configuration management for Panflute
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::AudioFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub state: StateConfig,
    pub library: LibraryConfig,
}

/// Timing and format knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How often the completion monitor polls the transport
    pub poll_interval_ms: u64,
    /// Pause between loading a track and issuing play; 0 plays immediately
    pub settle_delay_ms: u64,
    /// Pause between restoring a track and seeking to the saved position
    pub restore_seek_delay_ms: u64,
    /// Saved positions older than this are not resumed
    pub resume_window_secs: u64,
    pub initial_volume: f32,
    pub supported_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub database_path: PathBuf,
    pub key: String,
    pub autosave_secs: u64, // 0 disables
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub music_directories: Vec<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            settle_delay_ms: 100,
            restore_seek_delay_ms: 300,
            resume_window_secs: 3600,
            initial_volume: 1.0,
            supported_formats: AudioFormat::supported_extensions(),
        }
    }
}

impl PlayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn restore_seek_delay(&self) -> Duration {
        Duration::from_millis(self.restore_seek_delay_ms)
    }

    pub fn resume_window(&self) -> Duration {
        Duration::from_secs(self.resume_window_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            anyhow::bail!(
                "initial_volume must be between 0.0 and 1.0, got {}",
                self.initial_volume
            );
        }
        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            database_path: app_dir().join("state.db"),
            key: "playback_state".to_string(),
            autosave_secs: 30,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_directories: vec![
                dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music")),
            ],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.player.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("panflute");

        Ok(config_dir.join("config.toml"))
    }
}

/// Where panflute keeps its config, state database and logs.
pub fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panflute")
}
