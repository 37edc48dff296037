//! In-process engine for session tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::engine::{EngineError, PlaybackEngine};

#[derive(Debug)]
pub(crate) struct FakeState {
    pub loaded: Option<PathBuf>,
    pub position: Duration,
    pub duration: Duration,
    pub playing: bool,
    pub volume: f64,
    pub loop_at_end: bool,
    /// Paths whose `load` fails with a decode error.
    pub broken: Vec<PathBuf>,
    pub calls: Vec<&'static str>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            loaded: None,
            position: Duration::ZERO,
            duration: Duration::from_secs(180),
            playing: false,
            volume: 1.0,
            loop_at_end: false,
            broken: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Cloneable so a test can keep a handle after moving one into the session.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Let time pass as if audio were flowing.
    pub fn advance(&self, by: Duration) {
        let mut s = self.state();
        if s.playing {
            s.position = (s.position + by).min(s.duration);
        }
    }

    /// Simulate the natural end of the loaded track.
    pub fn finish_track(&self) {
        let mut s = self.state();
        s.position = Duration::ZERO;
        s.playing = s.loop_at_end;
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("load");
        if s.broken.iter().any(|p| p == path) {
            return Err(EngineError::Decode {
                path: path.to_path_buf(),
                reason: "corrupt".to_string(),
            });
        }
        s.loaded = Some(path.to_path_buf());
        s.position = Duration::ZERO;
        s.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("play");
        if s.loaded.is_none() {
            return Err(EngineError::NothingLoaded);
        }
        s.position = Duration::ZERO;
        s.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("pause");
        s.playing = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("resume");
        if s.loaded.is_none() {
            return Err(EngineError::NothingLoaded);
        }
        s.playing = true;
        Ok(())
    }

    fn seek_to(&mut self, position: Duration) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("seek_to");
        if s.loaded.is_none() {
            return Err(EngineError::NothingLoaded);
        }
        s.position = position.min(s.duration);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.state().position
    }

    fn duration(&self) -> Duration {
        self.state().duration
    }

    fn playing(&self) -> bool {
        self.state().playing
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("set_volume");
        s.volume = volume;
        Ok(())
    }

    fn set_loop_at_end(&mut self, enabled: bool) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("set_loop_at_end");
        s.loop_at_end = enabled;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut s = self.state();
        s.calls.push("stop");
        s.loaded = None;
        s.position = Duration::ZERO;
        s.playing = false;
        Ok(())
    }
}
