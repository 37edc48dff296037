//! Playback engine: the capability trait the session drives, and the
//! `rodio`-backed implementation that owns the output device on its own thread.

mod engine;
mod player;
mod sink;
mod thread;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::{EngineError, PlaybackEngine};
pub use player::RodioEngine;
pub use types::PlaybackHandle;

#[cfg(test)]
mod tests;
