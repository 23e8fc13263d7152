use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportState};
use crate::error::{PlayerError, Result};

/// rodio-backed [`Transport`].
///
/// The `OutputStream` is not `Send`, so it lives on a parked thread for as
/// long as this value exists; only the handle crosses threads.
pub struct RodioTransport {
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
    duration: f64,
    state: TransportState,
    _output_guard: mpsc::Sender<()>,
}

impl RodioTransport {
    pub fn new() -> Result<Self> {
        let (stream_handle, guard) = open_output()?;

        Ok(Self {
            stream_handle,
            sink: None,
            volume: 1.0,
            duration: 0.0,
            state: TransportState::Stopped,
            _output_guard: guard,
        })
    }

    fn load_source<R>(&mut self, reader: R, label: &str) -> Result<()>
    where
        R: Read + Seek + Send + Sync + 'static,
    {
        self.teardown();

        let source = Decoder::new(reader)
            .map_err(|e| PlayerError::Decode(format!("{}: {}", label, e)))?;
        self.duration = source
            .total_duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| PlayerError::Output(format!("failed to create sink: {}", e)))?;
        sink.set_volume(self.volume);
        sink.append(source);
        // Loaded means decoded and cued, not audible
        sink.pause();

        self.sink = Some(sink);
        self.state = TransportState::Loaded;
        info!("Loaded {} ({:.1}s)", label, self.duration);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.duration = 0.0;
        self.state = TransportState::Stopped;
    }

    fn sink(&self) -> Result<&Sink> {
        self.sink.as_ref().ok_or(PlayerError::NothingLoaded)
    }
}

impl Transport for RodioTransport {
    fn load_file(&mut self, path: &Path) -> Result<()> {
        // a failed load still replaces whatever was loaded before
        self.teardown();
        if !path.exists() {
            return Err(PlayerError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| {
            PlayerError::Decode(format!("failed to open {}: {}", path.display(), e))
        })?;
        self.load_source(BufReader::new(file), &path.display().to_string())
    }

    fn load_buffer(&mut self, bytes: Arc<[u8]>) -> Result<()> {
        self.teardown();
        if bytes.is_empty() {
            return Err(PlayerError::Decode("audio buffer is empty".to_string()));
        }
        let label = format!("buffer ({} bytes)", bytes.len());
        self.load_source(Cursor::new(bytes), &label)
    }

    fn play(&mut self) -> Result<()> {
        let sink = self.sink()?;
        sink.play();
        self.state = TransportState::Playing;
        debug!("Sink playing");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        match self.state {
            TransportState::Stopped => {
                debug!("Pause ignored, nothing loaded");
                Ok(())
            }
            _ => {
                self.sink()?.pause();
                self.state = TransportState::Paused;
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.teardown();
        debug!("Sink stopped");
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let duration = self.duration;
        if !seconds.is_finite() || seconds < 0.0 || (duration > 0.0 && seconds > duration) {
            return Err(PlayerError::InvalidSeek {
                target: seconds,
                duration,
            });
        }
        self.sink()?
            .try_seek(Duration::from_secs_f64(seconds))
            .map_err(|e| PlayerError::Output(format!("seek failed: {}", e)))
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlayerError::InvalidVolume(volume));
        }
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn current_time(&self) -> f64 {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> Result<bool> {
        Ok(self
            .sink
            .as_ref()
            .map(|sink| !sink.is_paused() && !sink.empty())
            .unwrap_or(false))
    }

    fn state(&self) -> TransportState {
        self.state
    }
}

/// Open the default output on its own thread and hand back the handle.
/// Dropping the returned sender lets the thread exit and close the stream.
fn open_output() -> Result<(OutputStreamHandle, mpsc::Sender<()>)> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let (guard_tx, guard_rx) = mpsc::channel::<()>();

    thread::Builder::new()
        .name("panflute-output".to_string())
        .spawn(move || match OutputStream::try_default() {
            Ok((stream, handle)) => {
                if ready_tx.send(Ok(handle)).is_err() {
                    return;
                }
                // Blocks until every sender is gone
                let _ = guard_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
            }
        })
        .map_err(|e| PlayerError::Output(format!("failed to spawn output thread: {}", e)))?;

    let handle = ready_rx
        .recv()
        .map_err(|_| PlayerError::Output("output thread exited early".to_string()))?
        .map_err(|e| {
            warn!("No audio output available: {}", e);
            PlayerError::Output(format!("failed to create output stream: {}", e))
        })?;

    Ok((handle, guard_tx))
}
