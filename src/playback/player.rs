//! The playback orchestrator.
//!
//! `Player` sequences the tracks of a [`TrackStore`] through one exclusively
//! owned [`Transport`]. A completion monitor polls the transport and advances
//! when a track runs out; user operations and monitor ticks interleave on the
//! session lock, and a stop guard plus a load generation keep a stop or a new
//! load from being overtaken by a tick that was already in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{EndReason, EventKind, Listeners, PlayerEvent};
use super::monitor::{MonitorHandle, Tick, Watch};
use super::order::ShuffleOrder;
use crate::audio::store::cursor_after_remove;
use crate::audio::{Song, Track, TrackStore, Transport, TransportState};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    /// No tracks, or nothing loaded yet
    Idle,
    /// A track is loaded and play is pending the settle delay
    Loading,
    Playing,
    Paused,
    /// After an explicit stop
    Stopped,
    /// A non-looping playlist ran out
    Ended,
}

impl PlayerState {
    fn is_active(self) -> bool {
        matches!(
            self,
            PlayerState::Loading | PlayerState::Playing | PlayerState::Paused
        )
    }
}

/// Point-in-time view of the player for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    pub current_index: usize,
    pub total_tracks: usize,
    pub current_time: f64,
    pub duration: f64,
    pub progress: f64,
    pub volume: f32,
    pub looping: bool,
    pub shuffle: bool,
    pub track: Option<Track>,
    pub metadata: Option<Song>,
}

pub struct Player<T: Transport> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Player<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

pub(crate) struct Shared<T: Transport> {
    session: Mutex<Session<T>>,
    stopping: AtomicBool,
    listeners: Mutex<Listeners>,
    config: PlayerConfig,
    runtime: Handle,
    this: Weak<Shared<T>>,
}

struct Session<T> {
    store: TrackStore,
    transport: T,
    index: usize,
    looping: bool,
    shuffle: Option<ShuffleOrder>,
    state: PlayerState,
    monitor: Option<MonitorHandle>,
    next_monitor_id: u64,
    // Bumped by every load and stop; continuations scheduled under an older
    // generation do nothing.
    generation: u64,
    disposed: bool,
}

type Outbox = Vec<PlayerEvent>;

impl<T: Transport> Player<T> {
    /// Must be called from within a tokio runtime; the monitor and the settle
    /// continuations are spawned onto it.
    pub fn new(mut transport: T, config: PlayerConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| PlayerError::NoRuntime)?;
        transport.set_volume(config.initial_volume)?;

        let session = Session {
            store: TrackStore::new(&config.supported_formats),
            transport,
            index: 0,
            looping: false,
            shuffle: None,
            state: PlayerState::Idle,
            monitor: None,
            next_monitor_id: 0,
            generation: 0,
            disposed: false,
        };

        let shared = Arc::new_cyclic(|this| Shared {
            session: Mutex::new(session),
            stopping: AtomicBool::new(false),
            listeners: Mutex::new(Listeners::default()),
            config,
            runtime,
            this: this.clone(),
        });

        Ok(Self { shared })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    // ---- track store ----

    pub fn add_track(&self, track: Track) -> Result<usize> {
        let mut s = self.shared.lock();
        let index = s.store.add(track)?;
        s.disposed = false;
        rebuild_shuffle(&mut *s);
        Ok(index)
    }

    pub fn load_tracks(&self, tracks: Vec<Track>) -> usize {
        let mut s = self.shared.lock();
        self.shared.halt(&mut s, true);
        let loaded = s.store.load(tracks);
        reset_cursor(&mut *s);
        loaded
    }

    pub fn load_songs(&self, songs: Vec<Song>) -> usize {
        let mut s = self.shared.lock();
        self.shared.halt(&mut s, true);
        let loaded = s.store.load_songs(songs);
        reset_cursor(&mut *s);
        loaded
    }

    /// Remove a track. Removing one before the cursor shifts the cursor back;
    /// removing the current one stops playback and clamps the cursor.
    pub fn remove_track(&self, index: usize) -> Result<Track> {
        let mut s = self.shared.lock();
        let len = s.store.len();
        if index >= len {
            return Err(PlayerError::IndexOutOfRange { index, len });
        }

        if index == s.index && s.state.is_active() {
            self.shared.halt(&mut s, false);
        }

        let (track, _) = s.store.remove(index)?;
        s.index = cursor_after_remove(s.index, index, s.store.len());
        if s.store.is_empty() {
            s.state = PlayerState::Idle;
        }
        rebuild_shuffle(&mut *s);
        Ok(track)
    }

    // ---- transport control ----

    /// Load the track under the cursor and start it. A no-op on an empty playlist.
    pub fn play_current_track(&self) -> Result<()> {
        self.shared.run(|shared, s, out| shared.play_current(s, out))
    }

    pub fn next_track(&self) -> Result<()> {
        self.shared.run(|shared, s, out| shared.advance(s, out))
    }

    /// Step back one track, stopping at the first one.
    pub fn previous_track(&self) -> Result<()> {
        self.shared.run(|shared, s, out| {
            if s.store.is_empty() {
                return Ok(());
            }
            s.index = match s.shuffle.as_mut() {
                Some(order) => order.back().unwrap_or(0),
                None => s.index.saturating_sub(1),
            };
            shared.play_current(s, out)
        })
    }

    pub fn go_to_track(&self, index: usize) -> Result<()> {
        self.shared.run(|shared, s, out| {
            let len = s.store.len();
            if index >= len {
                return Err(PlayerError::IndexOutOfRange { index, len });
            }
            s.index = index;
            if let Some(order) = s.shuffle.as_mut() {
                order.seek(index);
            }
            shared.play_current(s, out)
        })
    }

    pub fn pause(&self) -> Result<()> {
        let mut s = self.shared.lock();
        if !s.state.is_active() {
            debug!("Pause ignored in state {:?}", s.state);
            return Ok(());
        }
        s.transport.pause()?;
        // a paused track must not look finished
        self.shared.clear_monitor(&mut s);
        s.state = PlayerState::Paused;
        info!("Paused track {}", s.index);
        Ok(())
    }

    /// Continue the loaded track, or start the current one from scratch when
    /// nothing usable is loaded.
    pub fn resume(&self) -> Result<()> {
        self.shared.run(|shared, s, out| {
            let loaded = matches!(
                s.transport.state(),
                TransportState::Loaded | TransportState::Paused | TransportState::Playing
            ) && s.transport.duration() > 0.0;

            if s.state.is_active() && loaded {
                info!("Resuming track {}", s.index);
                shared.begin_playback(s)
            } else {
                shared.play_current(s, out)
            }
        })
    }

    /// Stop playback and rewind the cursor to the first track. Engine errors
    /// are logged, never returned.
    pub fn stop(&self) {
        let mut s = self.shared.lock();
        self.shared.halt(&mut s, true);
        info!("Stopped");
    }

    /// Manually move on to the next track, reporting the current one as skipped.
    pub fn skip(&self) -> Result<()> {
        self.shared.run(|shared, s, out| {
            if s.state.is_active() {
                if let Some(track) = s.store.get(s.index).cloned() {
                    out.push(PlayerEvent::TrackEnd {
                        track,
                        index: s.index,
                        reason: EndReason::Manual,
                    });
                }
            }
            shared.halt(s, false);
            shared.advance(s, out)
        })
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlayerError::InvalidVolume(volume));
        }
        self.shared.lock().transport.set_volume(volume)
    }

    pub fn set_loop(&self, looping: bool) {
        self.shared.lock().looping = looping;
    }

    pub fn set_shuffle(&self, enabled: bool) {
        let mut s = self.shared.lock();
        s.shuffle = enabled.then(|| ShuffleOrder::new(s.store.len(), s.index));
    }

    /// Seek to a fraction of the track. Out-of-range input or an unknown
    /// duration is logged and ignored; returns whether the seek happened.
    pub fn seek(&self, percent: f64) -> bool {
        let mut s = self.shared.lock();
        let duration = s.transport.duration();
        if duration <= 0.0 {
            warn!("Seek ignored, duration unknown");
            return false;
        }
        if !(0.0..=1.0).contains(&percent) {
            warn!("Seek ignored, {} is outside 0.0..=1.0", percent);
            return false;
        }
        seek_transport(&mut s.transport, percent * duration)
    }

    pub fn seek_seconds(&self, seconds: f64) -> bool {
        let mut s = self.shared.lock();
        let duration = s.transport.duration();
        if duration <= 0.0 {
            warn!("Seek ignored, duration unknown");
            return false;
        }
        if !(0.0..=duration).contains(&seconds) {
            warn!("Seek ignored, {}s is outside 0..={}s", seconds, duration);
            return false;
        }
        seek_transport(&mut s.transport, seconds)
    }

    // ---- queries ----

    pub fn current_time(&self) -> f64 {
        self.shared.lock().transport.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.shared.lock().transport.duration()
    }

    pub fn progress(&self) -> f64 {
        let s = self.shared.lock();
        progress_of(&s.transport)
    }

    pub fn volume(&self) -> f32 {
        self.shared.lock().transport.volume()
    }

    pub fn current_index(&self) -> usize {
        self.shared.lock().index
    }

    pub fn total_tracks(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn state(&self) -> PlayerState {
        self.shared.lock().state
    }

    pub fn is_loop(&self) -> bool {
        self.shared.lock().looping
    }

    pub fn is_shuffle(&self) -> bool {
        self.shared.lock().shuffle.is_some()
    }

    pub fn current_track(&self) -> Option<Track> {
        let s = self.shared.lock();
        s.store.get(s.index).cloned()
    }

    pub fn current_metadata(&self) -> Option<Song> {
        let s = self.shared.lock();
        s.store.metadata(s.index).cloned()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.shared.lock().store.tracks().to_vec()
    }

    pub fn status(&self) -> PlaybackStatus {
        let s = self.shared.lock();
        PlaybackStatus {
            state: s.state,
            current_index: s.index,
            total_tracks: s.store.len(),
            current_time: s.transport.current_time(),
            duration: s.transport.duration(),
            progress: progress_of(&s.transport),
            volume: s.transport.volume(),
            looping: s.looping,
            shuffle: s.shuffle.is_some(),
            track: s.store.get(s.index).cloned(),
            metadata: s.store.metadata(s.index).cloned(),
        }
    }

    // ---- events ----

    /// Register the handler for `kind`, replacing any previous one.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.listeners().set(kind, Arc::new(handler));
    }

    pub fn remove_listener(&self, kind: EventKind) -> bool {
        self.shared.listeners().remove(kind)
    }

    // ---- lifecycle ----

    /// Stop, release the monitor and forget every track and handler. Safe to
    /// call more than once.
    pub fn dispose(&self) {
        {
            let mut s = self.shared.lock();
            if s.disposed {
                debug!("Already disposed");
                return;
            }
            self.shared.halt(&mut s, true);
            s.store.clear();
            s.index = 0;
            s.looping = false;
            s.shuffle = None;
            s.state = PlayerState::Idle;
            s.disposed = true;
        }
        self.shared.listeners().clear();
        info!("Player disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Move the cursor without starting playback.
    pub(crate) fn cue(&self, index: usize) -> Result<()> {
        let mut s = self.shared.lock();
        let len = s.store.len();
        if index >= len {
            return Err(PlayerError::IndexOutOfRange { index, len });
        }
        if s.state.is_active() {
            self.shared.halt(&mut s, false);
        }
        s.index = index;
        if let Some(order) = s.shuffle.as_mut() {
            order.seek(index);
        }
        Ok(())
    }

    /// Bumped by every load and stop.
    pub(crate) fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub(crate) fn spawn_task<F>(&self, task: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.shared.runtime.spawn(task)
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<T>> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }
}

impl<T: Transport> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Session<T>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the session lock, then deliver whatever it emitted.
    fn run<R>(&self, op: impl FnOnce(&Self, &mut Session<T>, &mut Outbox) -> Result<R>) -> Result<R> {
        let mut out = Outbox::new();
        let result = {
            let mut s = self.lock();
            op(self, &mut *s, &mut out)
        };
        self.dispatch(out);
        result
    }

    /// Handlers run without the session lock so they may call back in.
    fn dispatch(&self, events: Outbox) {
        for event in events {
            let handler = self.listeners().get(event.kind());
            if let Some(handler) = handler {
                handler(&event);
            }
        }
    }

    fn play_current(&self, s: &mut Session<T>, out: &mut Outbox) -> Result<()> {
        if s.store.is_empty() {
            debug!("Nothing to play, playlist is empty");
            return Ok(());
        }
        s.index = s.index.min(s.store.len() - 1);

        self.clear_monitor(s);
        s.generation += 1;

        let index = s.index;
        let Some(track) = s.store.get(index).cloned() else {
            return Ok(());
        };
        let loaded = match &track {
            Track::File(path) => s.transport.load_file(path),
            Track::Buffer(bytes) => s.transport.load_buffer(Arc::clone(bytes)),
        };
        if let Err(e) = loaded {
            error!("Failed to load track {} '{}': {}", index, track, e);
            // the previous track must not keep playing unmonitored
            self.halt(s, false);
            return Err(e);
        }

        s.state = PlayerState::Loading;
        info!("Loaded track {} '{}'", index, track);
        out.push(PlayerEvent::TrackStart { track, index });

        let delay = self.config.settle_delay();
        if delay.is_zero() {
            return self.begin_playback(s);
        }

        let target = self.this.clone();
        let generation = s.generation;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = target.upgrade() {
                shared.finish_settle(generation);
            }
        });
        Ok(())
    }

    fn finish_settle(&self, generation: u64) {
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }
        let mut s = self.lock();
        if s.generation != generation || s.state != PlayerState::Loading {
            debug!("Settled load {} superseded", generation);
            return;
        }
        if let Err(e) = self.begin_playback(&mut s) {
            error!("Failed to start track {}: {}", s.index, e);
        }
    }

    fn begin_playback(&self, s: &mut Session<T>) -> Result<()> {
        if let Err(e) = s.transport.play() {
            s.state = PlayerState::Stopped;
            return Err(e);
        }
        s.state = PlayerState::Playing;
        self.start_monitor(s);
        Ok(())
    }

    fn advance(&self, s: &mut Session<T>, out: &mut Outbox) -> Result<()> {
        let len = s.store.len();
        if len == 0 {
            return Ok(());
        }

        let next = match s.shuffle.as_mut() {
            Some(order) => order.advance(),
            None => (s.index + 1 < len).then_some(s.index + 1),
        };
        let next = match next {
            Some(index) => Some(index),
            None if s.looping => {
                let wrapped = match s.shuffle.as_mut() {
                    Some(order) => {
                        *order = ShuffleOrder::new(len, rand_start(len, s.index));
                        order.current().unwrap_or(0)
                    }
                    None => 0,
                };
                debug!("Playlist wrapped to track {}", wrapped);
                Some(wrapped)
            }
            None => None,
        };

        match next {
            Some(index) => {
                s.index = index;
                self.play_current(s, out)
            }
            None => {
                self.clear_monitor(s);
                s.state = PlayerState::Ended;
                info!("Playlist ended at track {}", s.index);
                out.push(PlayerEvent::PlaylistEnd);
                Ok(())
            }
        }
    }

    /// Stop the transport under the stop guard. Engine errors are logged.
    fn halt(&self, s: &mut Session<T>, rewind: bool) {
        self.stopping.store(true, Ordering::SeqCst);
        self.clear_monitor(s);
        s.generation += 1;

        if s.transport.state() != TransportState::Stopped {
            if let Err(e) = s.transport.stop() {
                warn!("Transport stop failed, continuing: {}", e);
            }
        }

        if rewind {
            s.index = 0;
            if s.shuffle.is_some() {
                s.shuffle = Some(ShuffleOrder::new(s.store.len(), 0));
            }
        }
        s.state = if s.store.is_empty() {
            PlayerState::Idle
        } else {
            PlayerState::Stopped
        };
        self.stopping.store(false, Ordering::SeqCst);
    }

    fn start_monitor(&self, s: &mut Session<T>) {
        self.clear_monitor(s);
        s.next_monitor_id += 1;
        s.monitor = Some(MonitorHandle::spawn(
            &self.runtime,
            self.this.clone(),
            s.next_monitor_id,
            self.config.poll_interval(),
        ));
    }

    fn clear_monitor(&self, s: &mut Session<T>) {
        if let Some(monitor) = s.monitor.take() {
            monitor.cancel();
        }
    }
}

impl<T: Transport> Watch for Shared<T> {
    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn check(&self, monitor_id: u64) -> Tick {
        let mut s = self.lock();
        if self.is_stopping() {
            return Tick::Suppressed;
        }
        if s.monitor.as_ref().map(MonitorHandle::id) != Some(monitor_id) {
            return Tick::Retired;
        }

        let playing = s.transport.is_playing();
        match playing {
            Ok(true) => Tick::Playing,
            Ok(false) => {
                // detach first so no later tick can report this completion again
                if let Some(monitor) = s.monitor.take() {
                    monitor.retire();
                }
                let generation = s.generation;
                let index = s.index;
                let track = s.store.get(index).cloned();
                drop(s);

                if let Some(track) = track {
                    info!("Track {} '{}' completed", index, track);
                    self.dispatch(vec![PlayerEvent::TrackEnd {
                        track,
                        index,
                        reason: EndReason::Completed,
                    }]);
                }
                Tick::Finished { generation }
            }
            Err(e) => {
                error!("Completion monitor query failed, monitoring stopped: {}", e);
                if let Some(monitor) = s.monitor.take() {
                    monitor.retire();
                }
                Tick::Failed
            }
        }
    }

    fn advance_after_completion(&self, generation: u64) {
        if self.is_stopping() {
            debug!("Auto-advance suppressed by stop");
            return;
        }

        let mut out = Outbox::new();
        let result = {
            let mut s = self.lock();
            if s.generation != generation {
                debug!("Auto-advance dropped, generation {} superseded", generation);
                return;
            }
            self.advance(&mut s, &mut out)
        };
        self.dispatch(out);

        if let Err(e) = result {
            error!("Auto-advance failed: {}", e);
            let mut s = self.lock();
            self.clear_monitor(&mut s);
        }
    }
}

fn reset_cursor<T>(s: &mut Session<T>) {
    s.index = 0;
    s.state = PlayerState::Idle;
    s.disposed = false;
    rebuild_shuffle(s);
}

fn rebuild_shuffle<T>(s: &mut Session<T>) {
    if s.shuffle.is_some() {
        s.shuffle = Some(ShuffleOrder::new(s.store.len(), s.index));
    }
}

/// Random first entry for a wrapped shuffle order, never `avoid` unless it is the only track.
fn rand_start(len: usize, avoid: usize) -> usize {
    use rand::Rng;
    if len <= 1 {
        return 0;
    }
    let pick = rand::thread_rng().gen_range(0..len - 1);
    if pick >= avoid {
        pick + 1
    } else {
        pick
    }
}

fn progress_of<T: Transport>(transport: &T) -> f64 {
    let duration = transport.duration();
    if duration > 0.0 {
        (transport.current_time() / duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn seek_transport<T: Transport>(transport: &mut T, seconds: f64) -> bool {
    match transport.seek_to(seconds) {
        Ok(()) => {
            debug!("Seeked to {:.2}s", seconds);
            true
        }
        Err(e) => {
            warn!("Seek to {:.2}s failed: {}", seconds, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rand_start_skips_the_finished_track() {
        for _ in 0..200 {
            let first = rand_start(2, 1);
            assert_eq!(first, 0);
            let first = rand_start(5, 3);
            assert!(first < 5 && first != 3);
        }
        assert_eq!(rand_start(1, 0), 0);
        assert_eq!(rand_start(0, 0), 0);
    }
}
