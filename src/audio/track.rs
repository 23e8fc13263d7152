use super::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One playable unit. Identity is its position in the [`TrackStore`](super::TrackStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Track {
    File(PathBuf),
    Buffer(Arc<[u8]>),
}

/// Metadata produced by an external scanner, keyed by the same index as the track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: u64, // seconds, rounded
    #[serde(default)]
    pub cover: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub path: PathBuf,
}

impl Track {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Track::File(path.into())
    }

    pub fn buffer(bytes: impl Into<Arc<[u8]>>) -> Self {
        Track::Buffer(bytes.into())
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Track::File(path) => Some(path),
            Track::Buffer(_) => None,
        }
    }

    pub fn format(&self) -> AudioFormat {
        match self {
            Track::File(path) => AudioFormat::from_path(path),
            Track::Buffer(_) => AudioFormat::Unknown,
        }
    }

    /// Lowercased extension of a file track.
    pub fn extension(&self) -> Option<String> {
        self.path()
            .and_then(|path| path.extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    pub fn display_name(&self) -> String {
        match self {
            Track::File(path) => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            Track::Buffer(bytes) => format!("<buffer {} bytes>", bytes.len()),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::File(path) => write!(f, "{}", path.display()),
            Track::Buffer(bytes) => write!(f, "<buffer {} bytes>", bytes.len()),
        }
    }
}

impl Song {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("Unknown")
                .to_string()
        })
    }

    pub fn display_artist(&self) -> String {
        self.artist
            .clone()
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }

    pub fn track(&self) -> Track {
        Track::File(self.path.clone())
    }
}
