// Scripted stand-in for the audio engine, shared by the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use panflute::{Player, PlayerConfig, PlayerError, PlayerEvent, Result, Track, Transport, TransportState};
use panflute::EventKind;

pub const TRACK_SECONDS: f64 = 180.0;

pub struct MockState {
    pub state: TransportState,
    pub loads: Vec<String>,
    pub volume: f32,
    pub position: f64,
    pub duration: f64,
    pub finished: bool,
    pub seeks: Vec<f64>,
    pub play_calls: usize,
    pub stop_calls: usize,
    pub fail_load: bool,
    pub fail_stop: bool,
    pub fail_is_playing: bool,
}

/// Cloneable handle; the player owns one clone, the test keeps another to
/// script the engine and inspect what it was asked to do.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                state: TransportState::Stopped,
                loads: Vec::new(),
                volume: 1.0,
                position: 0.0,
                duration: 0.0,
                finished: false,
                seeks: Vec::new(),
                play_calls: 0,
                stop_calls: 0,
                fail_load: false,
                fail_stop: false,
                fail_is_playing: false,
            })),
        }
    }

    pub fn inner(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap()
    }

    /// The loaded track runs out.
    pub fn finish(&self) {
        let mut s = self.inner();
        s.finished = true;
        s.position = s.duration;
    }

    pub fn loads(&self) -> Vec<String> {
        self.inner().loads.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.inner().seeks.clone()
    }

    fn record_load(&self, what: String) -> Result<()> {
        let mut s = self.inner();
        if s.fail_load {
            return Err(PlayerError::Decode(format!("cannot decode {what}")));
        }
        s.loads.push(what);
        s.state = TransportState::Loaded;
        s.position = 0.0;
        s.duration = TRACK_SECONDS;
        s.finished = false;
        Ok(())
    }
}

impl Transport for MockTransport {
    fn load_file(&mut self, path: &Path) -> Result<()> {
        self.record_load(path.display().to_string())
    }

    fn load_buffer(&mut self, bytes: Arc<[u8]>) -> Result<()> {
        self.record_load(format!("buffer:{}", bytes.first().copied().unwrap_or(0)))
    }

    fn play(&mut self) -> Result<()> {
        let mut s = self.inner();
        if s.state == TransportState::Stopped {
            return Err(PlayerError::NothingLoaded);
        }
        s.state = TransportState::Playing;
        s.play_calls += 1;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut s = self.inner();
        if s.state == TransportState::Stopped {
            return Err(PlayerError::NothingLoaded);
        }
        s.state = TransportState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut s = self.inner();
        s.stop_calls += 1;
        s.state = TransportState::Stopped;
        s.duration = 0.0;
        s.position = 0.0;
        if s.fail_stop {
            return Err(PlayerError::Output("device went away".to_string()));
        }
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let mut s = self.inner();
        if !(0.0..=s.duration).contains(&seconds) {
            return Err(PlayerError::InvalidSeek {
                target: seconds,
                duration: s.duration,
            });
        }
        s.position = seconds;
        s.seeks.push(seconds);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlayerError::InvalidVolume(volume));
        }
        self.inner().volume = volume;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.inner().volume
    }

    fn current_time(&self) -> f64 {
        self.inner().position
    }

    fn duration(&self) -> f64 {
        self.inner().duration
    }

    fn is_playing(&self) -> Result<bool> {
        let s = self.inner();
        if s.fail_is_playing {
            return Err(PlayerError::Output("engine not responding".to_string()));
        }
        Ok(s.state == TransportState::Playing && !s.finished)
    }

    fn state(&self) -> TransportState {
        self.inner().state
    }
}

/// Default timings with play issued straight after load.
pub fn instant_config() -> PlayerConfig {
    PlayerConfig {
        settle_delay_ms: 0,
        ..PlayerConfig::default()
    }
}

/// `n` distinguishable in-memory tracks.
pub fn buffers(n: usize) -> Vec<Track> {
    (0..n).map(|i| Track::buffer(vec![i as u8; 4])).collect()
}

pub fn player_with(n: usize, config: PlayerConfig) -> (Player<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    let player = Player::new(transport.clone(), config).unwrap();
    player.load_tracks(buffers(n));
    (player, transport)
}

pub fn player(n: usize) -> (Player<MockTransport>, MockTransport) {
    player_with(n, instant_config())
}

pub type EventLog = Arc<Mutex<Vec<PlayerEvent>>>;

/// Subscribe to every event kind and collect what arrives.
pub fn record_events(player: &Player<MockTransport>) -> EventLog {
    let log: EventLog = Arc::default();
    for kind in [EventKind::TrackStart, EventKind::TrackEnd, EventKind::PlaylistEnd] {
        let log = Arc::clone(&log);
        player.on(kind, move |event| log.lock().unwrap().push(event.clone()));
    }
    log
}

pub fn events(log: &EventLog) -> Vec<PlayerEvent> {
    log.lock().unwrap().clone()
}
