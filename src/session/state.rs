use std::time::Duration;

use crate::library::Track;

/// The playback state of the session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// The registry holds no tracks.
    #[default]
    Empty,
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Empty | Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Committed session state as handed to sinks and the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub current_index: Option<usize>,
    pub current: Option<Track>,
    pub playing: bool,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f64,
    pub muted: bool,
    pub loop_at_end: bool,
    pub track_count: usize,
    /// Bumped on every committed transition.
    pub revision: u64,
}
