//! Ownership of the single child player process.
//!
//! The [`PlaybackManager`] is the only place that starts or stops players.
//! It serializes every request so that at most one child is alive at a time,
//! and a supervisor task per child clears the bookkeeping when the player
//! exits on its own.

mod error;
mod launcher;
mod manager;
mod process;

pub use error::PlaybackError;
pub use launcher::{Launcher, PlayerCommand};
pub use manager::{NowPlaying, PlaybackManager};
