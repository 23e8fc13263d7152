// Panflute - playlist orchestration on top of a single-track audio engine
// The engine only knows one track at a time; everything playlist-shaped lives here

pub mod audio;     // tracks, the track store, the transport facade
pub mod config;    // settings and timing knobs
pub mod error;
pub mod playback;  // the orchestrator and its completion monitor
pub mod state;     // save/restore of the playback position

pub use audio::{AudioFormat, Song, Track, TrackStore, Transport, TransportState};
pub use config::{Config, PlayerConfig};
pub use error::{ErrorKind, PlayerError, Result};
pub use playback::{EndReason, EventKind, PlaybackStatus, Player, PlayerEvent, PlayerState};
pub use state::{MemoryStore, Snapshot, StateStore};

#[cfg(feature = "audio")]
pub use audio::RodioTransport;

#[cfg(feature = "sqlite")]
pub use state::SqliteStore;
