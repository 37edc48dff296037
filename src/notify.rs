//! Notification fan-out: the sink capability set the session reports every
//! transition to, the fan-out that tolerates failing sinks, and the startup
//! factory that picks the media-session sink for the host platform.

mod desktop;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::library::Track;
use crate::mpris::{self, ControlCmd, MprisHandle};
use crate::platform::Platform;
use crate::session::SessionSnapshot;

pub use desktop::DesktopNotifier;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is unavailable: {0}")]
    Unavailable(String),
    #[error("sink worker has gone away")]
    Disconnected,
    #[error("{0}")]
    Failed(String),
}

/// Session transitions a sink can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    PlaybackChanged,
    PlayPauseChanged,
    VolumeChanged,
    PlaylistRepopulated,
    CurrentIndexChanged,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlaybackChanged => "playback-changed",
            Self::PlayPauseChanged => "play-pause-changed",
            Self::VolumeChanged => "volume-changed",
            Self::PlaylistRepopulated => "playlist-repopulated",
            Self::CurrentIndexChanged => "current-index-changed",
        };
        f.write_str(s)
    }
}

/// Something outside the session that mirrors playback state.
///
/// Every method sees the committed state. Implement only what the sink cares
/// about; the rest default to no-ops. Calls must not block for long.
pub trait NotificationSink: Send {
    fn name(&self) -> &str;

    fn on_playback_changed(&mut self, _snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_play_pause_changed(&mut self, _snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_volume_changed(&mut self, _snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_playlist_repopulated(
        &mut self,
        _tracks: &[Track],
        _snapshot: &SessionSnapshot,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_current_index_changed(&mut self, _snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        Ok(())
    }
}

/// The registered sinks. A failing sink is logged and skipped.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn NotificationSink>) {
        debug!(sink = sink.name(), "notification sink registered");
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn emit(&mut self, event: SessionEvent, snapshot: &SessionSnapshot, tracks: &[Track]) {
        for sink in &mut self.sinks {
            // A panicking sink must not unwind into the session lock.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
                SessionEvent::PlaybackChanged => sink.on_playback_changed(snapshot),
                SessionEvent::PlayPauseChanged => sink.on_play_pause_changed(snapshot),
                SessionEvent::VolumeChanged => sink.on_volume_changed(snapshot),
                SessionEvent::PlaylistRepopulated => sink.on_playlist_repopulated(tracks, snapshot),
                SessionEvent::CurrentIndexChanged => sink.on_current_index_changed(snapshot),
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sink = sink.name(), %event, error = %e, "notification sink failed");
                }
                Err(payload) => {
                    error!(
                        sink = sink.name(),
                        %event,
                        panic = panic_message(payload.as_ref()),
                        "notification sink panicked"
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic")
}

impl fmt::Debug for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|s| s.name()))
            .finish()
    }
}

/// Writes transitions to the log. Used where no media session exists.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn on_playback_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        match &snapshot.current {
            Some(t) => info!(state = ?snapshot.state, track = %t.display(), "now playing"),
            None => info!(state = ?snapshot.state, "nothing playing"),
        }
        Ok(())
    }

    fn on_play_pause_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        debug!(state = ?snapshot.state, "play/pause");
        Ok(())
    }

    fn on_volume_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        debug!(volume = snapshot.volume, muted = snapshot.muted, "volume");
        Ok(())
    }

    fn on_playlist_repopulated(
        &mut self,
        tracks: &[Track],
        _snapshot: &SessionSnapshot,
    ) -> Result<(), SinkError> {
        debug!(count = tracks.len(), "playlist repopulated");
        Ok(())
    }

    fn on_current_index_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        debug!(index = ?snapshot.current_index, "current index");
        Ok(())
    }
}

/// The platform's media-session sink, chosen once at startup.
pub enum MediaSession {
    Mpris(MprisHandle),
    Log(LogSink),
}

impl MediaSession {
    /// The MPRIS handle, for the runtime's position updates.
    pub fn mpris(&self) -> Option<MprisHandle> {
        match self {
            Self::Mpris(h) => Some(h.clone()),
            Self::Log(_) => None,
        }
    }

    pub fn into_sink(self) -> Box<dyn NotificationSink> {
        match self {
            Self::Mpris(h) => Box::new(h),
            Self::Log(l) => Box::new(l),
        }
    }
}

/// Pick the media session for `platform`. Transport commands arrive on `control_tx`.
///
/// Falls back to the logging sink when the platform has no supported session
/// or the session bus cannot be reached.
pub fn media_session_for(platform: Platform, control_tx: Sender<ControlCmd>) -> MediaSession {
    match platform {
        Platform::Linux => match mpris::spawn_mpris(control_tx) {
            Ok(handle) => MediaSession::Mpris(handle),
            Err(e) => {
                warn!(error = %e, "MPRIS unavailable, logging transitions instead");
                MediaSession::Log(LogSink)
            }
        },
        other => {
            info!(platform = %other, "no media session integration, logging transitions instead");
            MediaSession::Log(LogSink)
        }
    }
}
