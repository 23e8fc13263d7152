// Playlist sequencing: the orchestrator, its completion monitor and events

pub mod events;
mod monitor;
mod order;
pub mod player;

pub use events::{EndReason, EventKind, Handler, PlayerEvent};
pub use player::{PlaybackStatus, Player, PlayerState};
