//! Audio-related small types and handles.
//!
//! The command enum travels from `RodioEngine` to the audio thread; the
//! playback info is what the thread publishes back.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::engine::EngineError;

#[derive(Debug)]
pub(super) enum EngineCmd {
    /// Open a file and park it, paused, at the start.
    Load(PathBuf),
    /// Start the loaded file from the beginning.
    Play,
    Pause,
    Resume,
    SeekTo(Duration),
    SetVolume(f32),
    SetLoopAtEnd(bool),
    /// Drop the current sink and forget the loaded file.
    Stop,
    /// Quit the audio thread, optionally fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}

/// One command plus the channel its result goes back on.
pub(super) struct Request {
    pub cmd: EngineCmd,
    pub reply: Sender<Result<(), EngineError>>,
}

#[derive(Debug, Clone, Default)]
/// Runtime playback information shared with the session and the UI.
pub struct PlaybackInfo {
    /// Elapsed playback time for the loaded file.
    pub position: Duration,
    /// Total length, zero when unknown.
    pub duration: Duration,
    /// Whether audio is audibly advancing.
    pub playing: bool,
}

pub type PlaybackHandle = Arc<Mutex<PlaybackInfo>>;
