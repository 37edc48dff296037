use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::{EngineError, PlaybackEngine};
use crate::config::SettingsStore;
use crate::download::{CancelToken, DownloadPipeline, ProgressFn};
use crate::library::{Track, TrackRegistry};
use crate::notify::{Fanout, NotificationSink, SessionEvent};
use crate::search::{SearchFilter, SearchProvider, validate_query};

use super::error::SessionError;
use super::state::{PlaybackState, SessionSnapshot};

use SessionEvent::*;

/// Clamp to `0.0..=1.0` and keep three decimals, as stored in the settings file.
fn round_volume(v: f64) -> f64 {
    (v.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

/// Everything guarded by the session lock.
struct SessionInner {
    registry: TrackRegistry,
    engine: Box<dyn PlaybackEngine>,
    settings: SettingsStore,
    fanout: Fanout,
    /// Latest search results; `play_remote` looks ids up here.
    results: Vec<Track>,
    /// `Some` exactly when the registry is non-empty.
    current: Option<usize>,
    current_id: Option<String>,
    state: PlaybackState,
    volume: f64,
    /// Level to restore on unmute.
    muted_from: Option<f64>,
    loop_at_end: bool,
    /// Set once the engine reported playing for the current start.
    armed: bool,
    active_download: Option<CancelToken>,
    revision: u64,
}

impl SessionInner {
    fn snapshot(&self) -> SessionSnapshot {
        let current = self.current.and_then(|i| self.registry.get(i)).cloned();
        let engine_duration = self.engine.duration();
        let duration = if engine_duration.is_zero() {
            current.as_ref().map_or(Duration::ZERO, |t| t.duration)
        } else {
            engine_duration
        };
        SessionSnapshot {
            state: self.state,
            current_index: self.current,
            current,
            playing: self.engine.playing(),
            position: self.engine.position(),
            duration,
            volume: self.volume,
            muted: self.muted_from.is_some(),
            loop_at_end: self.loop_at_end,
            track_count: self.registry.len(),
            revision: self.revision,
        }
    }

    /// Mark the transition as committed and tell every sink about it.
    fn commit(&mut self, events: &[SessionEvent]) {
        self.revision += 1;
        if self.fanout.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for &event in events {
            self.fanout.emit(event, &snapshot, self.registry.list());
        }
    }

    fn require_tracks(&self) -> Result<usize, SessionError> {
        match self.registry.len() {
            0 => Err(SessionError::EmptyRegistry),
            n => Ok(n),
        }
    }

    fn select(&mut self, index: Option<usize>) {
        self.current = index;
        self.current_id = index
            .and_then(|i| self.registry.get(i))
            .map(|t| t.remote_id.clone());
    }

    /// Load and play `index`. On engine failure the index is left alone.
    fn start(&mut self, index: usize) -> Result<(), SessionError> {
        let path = self
            .registry
            .get(index)
            .and_then(|t| t.path.clone())
            .ok_or(SessionError::NotFound {
                index,
                len: self.registry.len(),
            })?;

        self.armed = false;
        let result = self.engine.load(&path).and_then(|()| self.engine.play());
        match result {
            Ok(()) => {
                self.select(Some(index));
                self.state = PlaybackState::Playing;
                debug!(index, path = %path.display(), "started");
                Ok(())
            }
            Err(e) => Err(self.adapter_failure(e)),
        }
    }

    /// Stop everything after an engine error and report the new state.
    fn adapter_failure(&mut self, e: EngineError) -> SessionError {
        warn!(error = %e, "playback engine failed");
        if let Err(stop_err) = self.engine.stop() {
            debug!(error = %stop_err, "engine stop after failure also failed");
        }
        self.armed = false;
        self.state = if self.registry.is_empty() {
            PlaybackState::Empty
        } else {
            PlaybackState::Stopped
        };
        self.commit(&[PlaybackChanged]);
        SessionError::Adapter(e)
    }

    /// Point `current` back at the current track after the registry changed.
    fn relocate(&mut self) {
        let found = self
            .current_id
            .as_deref()
            .and_then(|id| self.registry.position_of(id));
        match found {
            Some(i) => self.current = Some(i),
            None => {
                let active = matches!(self.state, PlaybackState::Playing | PlaybackState::Paused);
                if self.current_id.is_some() && active {
                    if let Err(e) = self.engine.stop() {
                        debug!(error = %e, "engine stop failed");
                    }
                    self.state = PlaybackState::Stopped;
                    self.armed = false;
                }
                let fallback = (!self.registry.is_empty()).then_some(0);
                self.select(fallback);
            }
        }

        if self.registry.is_empty() {
            self.state = PlaybackState::Empty;
            self.armed = false;
        } else if self.state == PlaybackState::Empty {
            self.state = PlaybackState::Stopped;
        }
    }

    fn apply_volume(&mut self, level: f64) -> Result<f64, SessionError> {
        let level = round_volume(level);
        self.engine.set_volume(level)?;
        self.volume = level;
        if let Err(e) = self.settings.set_volume(level) {
            warn!(error = %e, "failed to persist volume");
        }
        self.commit(&[VolumeChanged]);
        Ok(level)
    }
}

/// The single owner of the player session.
///
/// Every public method takes the session lock, so the UI thread, the MPRIS
/// callbacks (via the UI loop) and download workers can share one instance.
/// Sinks are notified after a transition is committed, while the lock is
/// still held.
pub struct SessionController {
    inner: Mutex<SessionInner>,
    search: Arc<dyn SearchProvider>,
    downloads: Arc<DownloadPipeline>,
    ticket: AtomicU64,
}

impl SessionController {
    pub fn new(
        registry: TrackRegistry,
        mut engine: Box<dyn PlaybackEngine>,
        settings: SettingsStore,
        search: Arc<dyn SearchProvider>,
        downloads: Arc<DownloadPipeline>,
    ) -> Self {
        let volume = round_volume(settings.settings().player.volume);
        let loop_at_end = settings.settings().player.loop_at_end;
        if let Err(e) = engine.set_volume(volume) {
            warn!(error = %e, "could not apply saved volume");
        }
        if let Err(e) = engine.set_loop_at_end(loop_at_end) {
            warn!(error = %e, "could not apply saved loop setting");
        }

        let mut inner = SessionInner {
            registry,
            engine,
            settings,
            fanout: Fanout::new(),
            results: Vec::new(),
            current: None,
            current_id: None,
            state: PlaybackState::Empty,
            volume,
            muted_from: None,
            loop_at_end,
            armed: false,
            active_download: None,
            revision: 0,
        };
        inner.relocate();
        info!(
            tracks = inner.registry.len(),
            volume, loop_at_end, "session ready"
        );

        Self {
            inner: Mutex::new(inner),
            search,
            downloads,
            ticket: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the in-flight download, if any, and hand out a newer ticket.
    fn take_ticket(&self, inner: &mut SessionInner) -> u64 {
        if let Some(token) = inner.active_download.take() {
            token.cancel();
        }
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn register_sink(&self, sink: Box<dyn NotificationSink>) {
        let mut inner = self.lock();
        inner.fanout.register(sink);
        debug!(sinks = inner.fanout.len(), "sink attached to session");
    }

    pub fn downloads(&self) -> Arc<DownloadPipeline> {
        self.downloads.clone()
    }

    /// Query the catalog and remember the results for `play_remote`.
    pub fn search(&self, query: &str, filter: SearchFilter) -> Result<Vec<Track>, SessionError> {
        let query = validate_query(query).map_err(|e| SessionError::Validation(e.to_string()))?;
        let results = self.search.search(query, filter)?;
        debug!(query, %filter, count = results.len(), "search results stored");
        self.lock().results = results.clone();
        Ok(results)
    }

    /// Download a search result if needed, then play it.
    ///
    /// The download runs without holding the lock. If another play command
    /// arrives meanwhile, this one returns `Superseded` and changes nothing.
    pub fn play_remote(
        &self,
        remote_id: &str,
        progress: ProgressFn<'_>,
    ) -> Result<usize, SessionError> {
        let (track, token, ticket) = {
            let mut inner = self.lock();
            let track = inner
                .results
                .iter()
                .find(|t| t.remote_id == remote_id)
                .cloned()
                .ok_or_else(|| SessionError::UnknownTrack(remote_id.to_string()))?;
            let ticket = self.take_ticket(&mut inner);
            let token = CancelToken::new();
            inner.active_download = Some(token.clone());
            (track, token, ticket)
        };

        let result = self.downloads.download(&track, &token, progress);

        let mut inner = self.lock();
        if self.ticket.load(Ordering::SeqCst) != ticket {
            debug!(id = remote_id, "play superseded");
            return Err(SessionError::Superseded);
        }
        inner.active_download = None;
        result?;

        inner.registry.refresh();
        inner.relocate();
        inner.commit(&[PlaylistRepopulated]);

        let index = inner
            .registry
            .position_of(&track.remote_id)
            .ok_or_else(|| SessionError::UnknownTrack(track.remote_id.clone()))?;
        inner.start(index)?;
        inner.commit(&[PlaybackChanged, CurrentIndexChanged]);
        info!(index, title = %track.title, "playing downloaded track");
        Ok(index)
    }

    pub fn play_from_registry(&self, index: usize) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let len = inner.require_tracks()?;
        if index >= len {
            return Err(SessionError::NotFound { index, len });
        }
        self.take_ticket(&mut inner);
        inner.start(index)?;
        inner.commit(&[PlaybackChanged, CurrentIndexChanged]);
        Ok(())
    }

    /// Move one track along. A user command takes a ticket, so a pending
    /// `play_remote` no longer wins; auto-advance does not.
    fn step(&self, forward: bool, user: bool) -> Result<usize, SessionError> {
        let mut inner = self.lock();
        let n = inner.require_tracks()?;
        if user {
            self.take_ticket(&mut inner);
        }
        let index = match (inner.current, forward) {
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
            (None, true) => 0,
            (None, false) => n - 1,
        };
        inner.start(index)?;
        inner.commit(&[PlaybackChanged, CurrentIndexChanged]);
        Ok(index)
    }

    /// Play the following track, wrapping to the first.
    pub fn next(&self) -> Result<usize, SessionError> {
        self.step(true, true)
    }

    /// Play the preceding track, wrapping to the last.
    pub fn previous(&self) -> Result<usize, SessionError> {
        self.step(false, true)
    }

    /// Move on after `tick_check_ended` reported the end of the track.
    ///
    /// Unlike `next`, this leaves an in-flight `play_remote` alone.
    pub fn advance_after_end(&self) -> Result<usize, SessionError> {
        self.step(true, false)
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        inner.require_tracks()?;
        if inner.state != PlaybackState::Playing {
            return Ok(());
        }
        if let Err(e) = inner.engine.pause() {
            return Err(inner.adapter_failure(e));
        }
        inner.state = PlaybackState::Paused;
        inner.commit(&[PlayPauseChanged]);
        Ok(())
    }

    /// Continue a paused track, or start the current one when stopped.
    pub fn resume(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        inner.require_tracks()?;
        match inner.state {
            PlaybackState::Playing | PlaybackState::Empty => Ok(()),
            PlaybackState::Paused => {
                if let Err(e) = inner.engine.resume() {
                    return Err(inner.adapter_failure(e));
                }
                inner.state = PlaybackState::Playing;
                inner.commit(&[PlayPauseChanged]);
                Ok(())
            }
            PlaybackState::Stopped => {
                self.take_ticket(&mut inner);
                let index = inner.current.unwrap_or(0);
                inner.start(index)?;
                inner.commit(&[PlaybackChanged, PlayPauseChanged]);
                Ok(())
            }
        }
    }

    /// Returns whether the session is playing afterwards.
    pub fn toggle_pause(&self) -> Result<bool, SessionError> {
        if self.state() == PlaybackState::Playing {
            self.pause()?;
        } else {
            self.resume()?;
        }
        Ok(self.state() == PlaybackState::Playing)
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        inner.require_tracks()?;
        inner.engine.stop()?;
        inner.armed = false;
        inner.state = PlaybackState::Stopped;
        inner.commit(&[PlaybackChanged, PlayPauseChanged]);
        Ok(())
    }

    /// Seek by `delta_secs` seconds. Ignored while stopped.
    pub fn seek(&self, delta_secs: f64) -> Result<(), SessionError> {
        if !delta_secs.is_finite() {
            return Err(SessionError::Validation(format!(
                "seek offset must be a finite number of seconds, got {delta_secs}"
            )));
        }
        let mut inner = self.lock();
        inner.require_tracks()?;
        if !matches!(inner.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Ok(());
        }
        inner.engine.seek_relative(delta_secs)?;
        Ok(())
    }

    /// Seek to `secs` from the start of the track. Ignored while stopped.
    pub fn seek_to(&self, secs: f64) -> Result<(), SessionError> {
        let target = Duration::try_from_secs_f64(secs).map_err(|_| {
            SessionError::Validation(format!(
                "seek position must be a non-negative number of seconds, got {secs}"
            ))
        })?;
        let mut inner = self.lock();
        inner.require_tracks()?;
        if !matches!(inner.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Ok(());
        }
        inner.engine.seek_to(target)?;
        Ok(())
    }

    /// Add `delta` to the volume, clamp, persist. Returns the new level.
    pub fn set_volume(&self, delta: f64) -> Result<f64, SessionError> {
        if !delta.is_finite() {
            return Err(SessionError::Validation(format!(
                "volume change must be finite, got {delta}"
            )));
        }
        let mut inner = self.lock();
        inner.muted_from = None;
        let target = inner.volume + delta;
        inner.apply_volume(target)
    }

    /// Set the volume to an absolute level, clamped to `0.0..=1.0`.
    pub fn set_volume_to(&self, level: f64) -> Result<f64, SessionError> {
        if !level.is_finite() {
            return Err(SessionError::Validation(format!(
                "volume must be finite, got {level}"
            )));
        }
        let mut inner = self.lock();
        inner.muted_from = None;
        inner.apply_volume(level)
    }

    /// Mute, or restore the level from before muting. Not persisted.
    pub fn toggle_mute(&self) -> Result<bool, SessionError> {
        let mut inner = self.lock();
        let muted = match inner.muted_from {
            Some(previous) => {
                inner.engine.set_volume(previous)?;
                inner.muted_from = None;
                inner.volume = previous;
                false
            }
            None => {
                inner.engine.set_volume(0.0)?;
                inner.muted_from = Some(inner.volume);
                inner.volume = 0.0;
                true
            }
        };
        inner.commit(&[VolumeChanged]);
        Ok(muted)
    }

    /// Flip loop-at-end and persist it. Returns the new value.
    pub fn toggle_loop(&self) -> Result<bool, SessionError> {
        let mut inner = self.lock();
        let enabled = !inner.loop_at_end;
        inner.engine.set_loop_at_end(enabled)?;
        inner.loop_at_end = enabled;
        if let Err(e) = inner.settings.set_loop_at_end(enabled) {
            warn!(error = %e, "failed to persist loop setting");
        }
        inner.commit(&[PlaybackChanged]);
        Ok(enabled)
    }

    /// Shuffle the registry, keeping the current track current.
    pub fn shuffle(&self) -> Result<usize, SessionError> {
        let mut inner = self.lock();
        inner.require_tracks()?;
        inner.registry.shuffle();
        inner.relocate();
        inner.commit(&[PlaylistRepopulated, CurrentIndexChanged]);
        Ok(inner.current.unwrap_or(0))
    }

    /// Delete the track at `index` together with its files.
    ///
    /// When it is the current track, playback first moves on to the next one
    /// (or stops if it was the only one).
    pub fn delete_current_or(&self, index: usize) -> Result<Track, SessionError> {
        let mut inner = self.lock();
        let n = inner.require_tracks()?;
        if index >= n {
            return Err(SessionError::NotFound { index, len: n });
        }

        let deleting_current = inner.current == Some(index);
        if deleting_current {
            if n > 1 {
                let next = (index + 1) % n;
                let active = matches!(inner.state, PlaybackState::Playing | PlaybackState::Paused);
                if active {
                    if let Err(e) = inner.start(next) {
                        warn!(error = %e, "could not advance before delete");
                        inner.select(Some(next));
                    }
                } else {
                    if let Err(e) = inner.engine.stop() {
                        debug!(error = %e, "engine stop failed");
                    }
                    inner.select(Some(next));
                }
            } else {
                if let Err(e) = inner.engine.stop() {
                    debug!(error = %e, "engine stop failed");
                }
                inner.armed = false;
                inner.state = PlaybackState::Stopped;
                inner.select(None);
            }
        }

        let removed = match inner.registry.delete(index) {
            Ok(t) => t,
            Err(e) => {
                if deleting_current {
                    inner.relocate();
                    inner.commit(&[PlaybackChanged, CurrentIndexChanged]);
                }
                return Err(e.into());
            }
        };
        self.downloads.remove_sidecars(&removed);
        inner.relocate();

        if deleting_current {
            inner.commit(&[PlaylistRepopulated, PlaybackChanged, CurrentIndexChanged]);
        } else {
            inner.commit(&[PlaylistRepopulated, CurrentIndexChanged]);
        }
        info!(id = %removed.remote_id, title = %removed.title, "track deleted");
        Ok(removed)
    }

    /// Polled once per UI tick: did the current track just run out?
    ///
    /// Only reports `true` after the engine was seen playing since the last
    /// start, so a freshly loaded track never counts as finished. The caller
    /// decides what comes next.
    pub fn tick_check_ended(&self) -> bool {
        let mut inner = self.lock();
        if inner.current.is_none() || inner.state != PlaybackState::Playing || inner.loop_at_end {
            return false;
        }
        if inner.engine.playing() {
            inner.armed = true;
            return false;
        }
        if inner.armed && inner.engine.position().is_zero() {
            inner.armed = false;
            inner.state = PlaybackState::Stopped;
            inner.commit(&[PlayPauseChanged]);
            return true;
        }
        false
    }

    /// Rescan the music directory.
    pub fn refresh_registry(&self) {
        let mut inner = self.lock();
        inner.registry.refresh();
        inner.relocate();
        inner.commit(&[PlaylistRepopulated, CurrentIndexChanged]);
    }

    /// Cancel downloads and release the audio device.
    pub fn shutdown(&self, fade_out: Duration) {
        let mut inner = self.lock();
        if let Some(token) = inner.active_download.take() {
            token.cancel();
        }
        inner.engine.shutdown(fade_out);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.lock().registry.list().to_vec()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock().current
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    pub fn playing(&self) -> bool {
        self.lock().engine.playing()
    }

    pub fn volume(&self) -> f64 {
        self.lock().volume
    }

    pub fn muted(&self) -> bool {
        self.lock().muted_from.is_some()
    }

    pub fn loop_at_end(&self) -> bool {
        self.lock().loop_at_end
    }

    pub fn position(&self) -> Duration {
        self.lock().engine.position()
    }

    pub fn duration(&self) -> Duration {
        self.lock().snapshot().duration
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }
}
