//! Music playback: queue engine, media lookup, and the per-guild player loop.

pub mod player;
pub mod queue;
pub mod source;
pub mod spotify;

pub use player::{GuildPlayer, PlayerDeps, PlayerEvent};
pub use queue::{LoopMode, MusicQueue, QueueEntry};
