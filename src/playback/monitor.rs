// Completion monitor - infers "track finished" by polling the transport
// The engine has no end-of-track callback, so a falling `is_playing` edge is the signal

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// A stop is in progress
    Suppressed,
    Playing,
    /// The track ran out; the monitor has already been detached and
    /// TRACK_END emitted. Carries the transport generation it saw.
    Finished { generation: u64 },
    /// This monitor is no longer the live one
    Retired,
    /// The transport query failed; monitoring ends
    Failed,
}

/// What the monitor watches. Implemented by the player.
pub(crate) trait Watch: Send + Sync + 'static {
    fn is_stopping(&self) -> bool;

    fn check(&self, monitor_id: u64) -> Tick;

    /// Advance past a completed track unless `generation` has been superseded.
    fn advance_after_completion(&self, generation: u64);
}

pub(crate) struct MonitorHandle {
    id: u64,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub(crate) fn spawn<W: Watch>(runtime: &Handle, target: Weak<W>, id: u64, every: Duration) -> Self {
        debug!("Completion monitor {} started ({}ms)", id, every.as_millis());
        let task = runtime.spawn(watch(target, id, every));
        Self { id, task }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Abort the polling task. Used by every external clear.
    pub(crate) fn cancel(self) {
        debug!("Completion monitor {} cleared", self.id);
        self.task.abort();
    }

    /// Detach without aborting; the task is finishing on its own and still
    /// has the deferred advance to run.
    pub(crate) fn retire(self) {
        debug!("Completion monitor {} retired", self.id);
    }
}

async fn watch<W: Watch>(target: Weak<W>, id: u64, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(watched) = target.upgrade() else {
            break;
        };
        if watched.is_stopping() {
            continue;
        }

        match watched.check(id) {
            Tick::Suppressed | Tick::Playing => continue,
            Tick::Retired | Tick::Failed => break,
            Tick::Finished { generation } => {
                drop(watched);
                // Leave the polling callback before advancing
                tokio::task::yield_now().await;
                if let Some(watched) = target.upgrade() {
                    watched.advance_after_completion(generation);
                }
                break;
            }
        }
    }

    debug!("Completion monitor {} exited", id);
}
