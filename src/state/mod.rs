// Save and restore of the playback position through a key-value store

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::audio::Transport;
use crate::error::Result;
use crate::playback::Player;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The persisted subset of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub current_track_index: usize,
    pub current_time: f64,
    pub volume: f32,
    #[serde(rename = "loop")]
    pub looping: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn hours_since_save(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Whether the saved position is recent enough to resume.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age_ms = (now - self.timestamp).num_milliseconds();
        age_ms < window.as_millis() as i64
    }
}

/// Asynchronous key-value storage for snapshots. Values travel as JSON.
pub trait StateStore: Send + Sync {
    fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send;

    fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Process-local store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Store raw JSON under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, json: impl Into<String>) {
        self.entries().insert(key.to_string(), json.into());
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send {
        let raw = self.entries().get(key).cloned();
        async move {
            match raw {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        }
    }

    fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<()>> + Send {
        let encoded = serde_json::to_string(value);
        let key = key.to_string();
        async move {
            let json = encoded?;
            self.entries().insert(key, json);
            Ok(())
        }
    }
}

impl<T: Transport> Player<T> {
    /// Capture the current position, volume and loop flag.
    pub fn snapshot(&self) -> Snapshot {
        let status = self.status();
        Snapshot {
            current_track_index: status.current_index,
            current_time: status.current_time,
            volume: status.volume,
            looping: status.looping,
            timestamp: Utc::now(),
        }
    }

    pub async fn save_state<S: StateStore>(&self, store: &S, key: &str) -> Result<()> {
        let snapshot = self.snapshot();
        store.set(key, &snapshot).await?;
        debug!(
            "Saved state under '{}': track {} at {:.1}s",
            key, snapshot.current_track_index, snapshot.current_time
        );
        Ok(())
    }

    /// Restore a saved session. Returns `false` when there was nothing usable
    /// to restore. The position is only resumed for recent snapshots.
    pub async fn load_state<S: StateStore>(&self, store: &S, key: &str) -> Result<bool> {
        let Some(snapshot) = store.get::<Snapshot>(key).await? else {
            info!("No saved state under '{}'", key);
            return Ok(false);
        };

        let index = snapshot.current_track_index;
        let total = self.total_tracks();
        if index >= total {
            warn!(
                "Saved track {} no longer exists ({} tracks), not restoring",
                index, total
            );
            return Ok(false);
        }

        if let Err(e) = self.set_volume(snapshot.volume) {
            warn!("Ignoring saved volume: {}", e);
        }
        self.set_loop(snapshot.looping);

        let now = Utc::now();
        if snapshot.is_fresh(now, self.config().resume_window()) {
            info!(
                "Resuming track {} at {:.1}s (saved {:.2}h ago)",
                index,
                snapshot.current_time,
                snapshot.hours_since_save(now)
            );
            self.go_to_track(index)?;
            let generation = self.generation();
            tokio::time::sleep(self.config().restore_seek_delay()).await;
            if self.generation() != generation || self.current_index() != index {
                debug!("Restore seek dropped, track {} was superseded", index);
            } else if snapshot.current_time > 0.0 {
                self.seek_seconds(snapshot.current_time);
            }
        } else {
            info!(
                "Saved state is {:.1}h old, restoring track {} from the start",
                snapshot.hours_since_save(now),
                index
            );
            self.cue(index)?;
        }

        Ok(true)
    }

    /// Save a snapshot every `every` until the handle is aborted or the
    /// player is disposed.
    pub fn spawn_autosave<S>(&self, store: Arc<S>, key: impl Into<String>, every: Duration) -> JoinHandle<()>
    where
        S: StateStore + 'static,
    {
        let target = self.downgrade();
        let key = key.into();
        self.spawn_task(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(shared) = target.upgrade() else {
                    break;
                };
                let player = Player::from_shared(shared);
                if player.is_disposed() {
                    break;
                }
                if let Err(e) = player.save_state(store.as_ref(), &key).await {
                    warn!("Autosave failed: {}", e);
                }
            }
            debug!("Autosave for '{}' stopped", key);
        })
    }
}
