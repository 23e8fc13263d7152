use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrackStart,
    TrackEnd,
    PlaylistEnd,
}

/// Why a track stopped being current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The monitor saw the transport run out
    Completed,
    /// The caller skipped it
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStart {
        track: Track,
        index: usize,
    },
    TrackEnd {
        track: Track,
        index: usize,
        reason: EndReason,
    },
    PlaylistEnd,
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::TrackStart { .. } => EventKind::TrackStart,
            PlayerEvent::TrackEnd { .. } => EventKind::TrackEnd,
            PlayerEvent::PlaylistEnd => EventKind::PlaylistEnd,
        }
    }
}

pub type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// One handler slot per event kind; registering again replaces the old one.
#[derive(Default)]
pub(crate) struct Listeners {
    track_start: Option<Handler>,
    track_end: Option<Handler>,
    playlist_end: Option<Handler>,
}

impl Listeners {
    fn slot(&mut self, kind: EventKind) -> &mut Option<Handler> {
        match kind {
            EventKind::TrackStart => &mut self.track_start,
            EventKind::TrackEnd => &mut self.track_end,
            EventKind::PlaylistEnd => &mut self.playlist_end,
        }
    }

    pub(crate) fn set(&mut self, kind: EventKind, handler: Handler) {
        *self.slot(kind) = Some(handler);
    }

    pub(crate) fn remove(&mut self, kind: EventKind) -> bool {
        self.slot(kind).take().is_some()
    }

    /// Cloned out so the caller can invoke it without holding the lock.
    pub(crate) fn get(&self, kind: EventKind) -> Option<Handler> {
        match kind {
            EventKind::TrackStart => self.track_start.clone(),
            EventKind::TrackEnd => self.track_end.clone(),
            EventKind::PlaylistEnd => self.playlist_end.clone(),
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
