use std::collections::HashSet;

use tracing::{info, warn};

use super::track::{Song, Track};
use super::AudioFormat;
use crate::error::{PlayerError, Result};

/// Ordered, index-addressable list of tracks with parallel optional metadata.
///
/// `songs` always has the same length as `tracks`; entries added without
/// metadata hold `None`.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: Vec<Track>,
    songs: Vec<Option<Song>>,
    supported: HashSet<String>,
}

impl TrackStore {
    pub fn new<I, S>(supported_formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tracks: Vec::new(),
            songs: Vec::new(),
            supported: supported_formats
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Buffers are always accepted; files only with a known extension.
    pub fn accepts(&self, track: &Track) -> bool {
        match track {
            Track::Buffer(_) => true,
            Track::File(_) => track
                .extension()
                .map_or(false, |ext| self.supported.contains(&ext)),
        }
    }

    /// Replace the whole store, dropping unsupported file entries.
    pub fn load(&mut self, tracks: Vec<Track>) -> usize {
        let total = tracks.len();
        let accepted: Vec<Track> = tracks
            .into_iter()
            .filter(|track| {
                let ok = self.accepts(track);
                if !ok {
                    warn!("Skipping unsupported track: {}", track);
                }
                ok
            })
            .collect();

        self.songs = vec![None; accepted.len()];
        self.tracks = accepted;
        info!("Loaded {} of {} tracks", self.tracks.len(), total);
        self.tracks.len()
    }

    /// Replace tracks and metadata together; each song contributes its path.
    pub fn load_songs(&mut self, songs: Vec<Song>) -> usize {
        let total = songs.len();
        let (tracks, songs): (Vec<Track>, Vec<Option<Song>>) = songs
            .into_iter()
            .filter_map(|song| {
                let track = song.track();
                if self.accepts(&track) {
                    Some((track, Some(song)))
                } else {
                    warn!("Skipping unsupported song: {}", song.path.display());
                    None
                }
            })
            .unzip();

        self.tracks = tracks;
        self.songs = songs;
        info!("Loaded {} of {} songs with metadata", self.tracks.len(), total);
        self.tracks.len()
    }

    /// Append a track, returning its index.
    ///
    /// The existence check is best-effort: the file may still vanish before it is loaded.
    pub fn add(&mut self, track: Track) -> Result<usize> {
        if let Track::File(path) = &track {
            if !self.accepts(&track) {
                return Err(PlayerError::UnsupportedFormat(path.clone()));
            }
            if !path.exists() {
                return Err(PlayerError::FileNotFound(path.clone()));
            }
        }

        info!("Added track '{}' at position {}", track, self.tracks.len());
        self.tracks.push(track);
        self.songs.push(None);
        Ok(self.tracks.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<(Track, Option<Song>)> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }

        let track = self.tracks.remove(index);
        let song = self.songs.remove(index);
        info!("Removed track '{}' from position {}", track, index);
        Ok((track, song))
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.songs.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn metadata(&self, index: usize) -> Option<&Song> {
        self.songs.get(index).and_then(Option::as_ref)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(AudioFormat::supported_extensions())
    }
}

/// Where the cursor lands after removing `removed`; the result is clamped into
/// the shrunk store (0 when it is empty).
pub fn cursor_after_remove(current: usize, removed: usize, new_len: usize) -> usize {
    let shifted = if removed < current { current - 1 } else { current };
    shifted.min(new_len.saturating_sub(1))
}
