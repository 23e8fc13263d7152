pub mod store;
pub mod track;
pub mod transport;

#[cfg(feature = "audio")]
pub mod rodio_transport;

pub use store::TrackStore;
pub use track::{Song, Track};
pub use transport::{AudioDevice, Transport, TransportState};

#[cfg(feature = "audio")]
pub use rodio_transport::RodioTransport;

/// Extensions the engine will accept, matching what the rodio/symphonia build decodes.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "flac", "ogg", "oga", "opus", "aac", "m4a", "mp4",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Opus,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "opus" => AudioFormat::Opus,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }

    pub fn supported_extensions() -> Vec<String> {
        SUPPORTED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
    }
}

/// Case-insensitive check against the default extension list.
pub fn is_format_supported(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}
