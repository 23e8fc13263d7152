// Facade over a single-track audio engine
// The player owns exactly one of these; loading a new track supersedes the old one

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Loaded,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

impl AudioDevice {
    pub fn default_output() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default Output Device".to_string(),
            is_default: true,
        }
    }
}

/// Synchronous single-track engine.
///
/// All calls are expected to be fast and in-process. Invalid input (volume
/// outside `[0, 1]`, seek past the end, play before load) is reported as an
/// error rather than ignored.
pub trait Transport: Send + 'static {
    fn load_file(&mut self, path: &Path) -> Result<()>;

    fn load_buffer(&mut self, bytes: Arc<[u8]>) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn seek_to(&mut self, seconds: f64) -> Result<()>;

    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn volume(&self) -> f32;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    /// Length of the loaded track in seconds, 0.0 when unknown.
    fn duration(&self) -> f64;

    /// The only completion signal the engine offers; polled by the monitor.
    fn is_playing(&self) -> Result<bool>;

    fn state(&self) -> TransportState;

    fn devices(&self) -> Vec<AudioDevice> {
        vec![AudioDevice::default_output()]
    }
}
