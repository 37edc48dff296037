use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio output device: {0}")]
    NoDevice(String),
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("nothing is loaded")]
    NothingLoaded,
    #[error("invalid seek offset {0}")]
    InvalidSeek(f64),
    #[error("audio thread has stopped")]
    Disconnected,
}

/// What the session needs from an audio backend.
///
/// Contract: `load` leaves the track paused at zero; `play` starts it from the
/// beginning. When a track runs out without loop-at-end, `position()` drops
/// back to zero and `playing()` turns false. That pair is the only end signal.
pub trait PlaybackEngine: Send {
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn resume(&mut self) -> Result<(), EngineError>;
    fn seek_to(&mut self, position: Duration) -> Result<(), EngineError>;

    /// Seek by a signed number of seconds, clamped to the track bounds.
    fn seek_relative(&mut self, delta_secs: f64) -> Result<(), EngineError> {
        let mut target = self.position().as_secs_f64() + delta_secs;
        let total = self.duration().as_secs_f64();
        if total > 0.0 {
            target = target.min(total);
        }
        let target = Duration::try_from_secs_f64(target.max(0.0))
            .map_err(|_| EngineError::InvalidSeek(delta_secs))?;
        self.seek_to(target)
    }

    fn position(&self) -> Duration;
    fn duration(&self) -> Duration;
    fn playing(&self) -> bool;
    fn set_volume(&mut self, volume: f64) -> Result<(), EngineError>;
    fn set_loop_at_end(&mut self, enabled: bool) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Release the output device, fading out first. Called once at exit.
    fn shutdown(&mut self, _fade_out: Duration) {}
}
