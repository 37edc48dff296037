use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, warn};

use super::engine::EngineError;
use super::sink::{create_sink_at, probe_duration};
use super::types::{EngineCmd, PlaybackHandle, Request};

const TICK: Duration = Duration::from_millis(100);

/// Everything the audio thread owns.
struct AudioState {
    stream: OutputStream,
    sink: Option<Sink>,
    path: Option<PathBuf>,
    /// Where the current sink started inside the file; `get_pos` is relative to it.
    offset: Duration,
    duration: Duration,
    volume: f32,
    loop_at_end: bool,
    info: PlaybackHandle,
}

impl AudioState {
    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map_or(Duration::ZERO, |s| self.offset + s.get_pos())
    }

    fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.is_paused() && !s.empty())
    }

    fn publish(&self) {
        if let Ok(mut info) = self.info.lock() {
            info.position = self.position();
            info.duration = self.duration;
            info.playing = self.is_playing();
        }
    }

    fn drop_sink(&mut self) {
        if let Some(s) = self.sink.take() {
            s.stop();
        }
        self.offset = Duration::ZERO;
    }

    /// Replace the sink with a fresh one for the loaded file at `start_at`.
    fn rebuild(&mut self, start_at: Duration, play: bool) -> Result<(), EngineError> {
        let path = self.path.clone().ok_or(EngineError::NothingLoaded)?;
        let sink = create_sink_at(&self.stream, &path, start_at, self.volume)?;
        self.drop_sink();
        if play {
            sink.play();
        }
        self.sink = Some(sink);
        self.offset = start_at;
        Ok(())
    }

    fn handle(&mut self, cmd: EngineCmd) -> Result<(), EngineError> {
        match cmd {
            EngineCmd::Load(path) => {
                let sink = create_sink_at(&self.stream, &path, Duration::ZERO, self.volume)?;
                self.drop_sink();
                self.duration = probe_duration(&path);
                debug!(path = %path.display(), duration = ?self.duration, "loaded");
                self.sink = Some(sink);
                self.path = Some(path);
            }
            EngineCmd::Play => self.rebuild(Duration::ZERO, true)?,
            EngineCmd::Pause => {
                if let Some(s) = &self.sink {
                    s.pause();
                }
            }
            EngineCmd::Resume => match &self.sink {
                Some(s) => s.play(),
                // Ran out earlier: start over.
                None if self.path.is_some() => self.rebuild(Duration::ZERO, true)?,
                None => return Err(EngineError::NothingLoaded),
            },
            EngineCmd::SeekTo(pos) => {
                if self.path.is_none() {
                    return Err(EngineError::NothingLoaded);
                }
                let pos = if self.duration > Duration::ZERO {
                    pos.min(self.duration)
                } else {
                    pos
                };
                let playing = self.is_playing();
                let seeked = playing
                    && self
                        .sink
                        .as_ref()
                        .is_some_and(|s| s.try_seek(pos).is_ok());
                if seeked {
                    self.offset = Duration::ZERO;
                } else {
                    self.rebuild(pos, playing)?;
                }
            }
            EngineCmd::SetVolume(v) => {
                self.volume = v;
                if let Some(s) = &self.sink {
                    s.set_volume(v);
                }
            }
            EngineCmd::SetLoopAtEnd(enabled) => self.loop_at_end = enabled,
            EngineCmd::Stop => {
                self.drop_sink();
                self.path = None;
                self.duration = Duration::ZERO;
            }
            EngineCmd::Quit { fade_out_ms } => {
                if let Some(s) = &self.sink {
                    fade_out_sink(s, self.volume, fade_out_ms);
                }
                self.drop_sink();
            }
        }
        Ok(())
    }

    /// Periodic check for a drained sink.
    fn tick(&mut self) {
        let drained = self
            .sink
            .as_ref()
            .is_some_and(|s| !s.is_paused() && s.empty());
        if !drained {
            return;
        }
        if self.loop_at_end {
            if let Err(e) = self.rebuild(Duration::ZERO, true) {
                warn!(error = %e, "could not restart track for loop");
                self.drop_sink();
            }
        } else {
            // Keep the path so play/resume can start it again.
            self.drop_sink();
        }
    }
}

fn fade_out_sink(sink: &Sink, from: f32, fade_out_ms: u64) {
    if fade_out_ms == 0 {
        sink.set_volume(0.0);
        return;
    }
    let steps: u64 = 20;
    let step_ms = (fade_out_ms / steps).max(1);
    for step in 1..=steps {
        let t = step as f32 / steps as f32;
        sink.set_volume(from * (1.0 - t));
        thread::sleep(Duration::from_millis(step_ms));
    }
    sink.set_volume(0.0);
}

/// Spawn the thread that owns the output stream.
///
/// `ready` receives `Ok` once the device is open, or the error that stopped it.
pub(super) fn spawn_audio_thread(
    rx: Receiver<Request>,
    info: PlaybackHandle,
    ready: Sender<Result<(), EngineError>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut stream = match OutputStreamBuilder::open_default_stream() {
            Ok(s) => s,
            Err(e) => {
                let _ = ready.send(Err(EngineError::NoDevice(e.to_string())));
                return;
            }
        };
        // rodio logs to stderr when OutputStream is dropped, which garbles the TUI.
        stream.log_on_drop(false);

        let mut state = AudioState {
            stream,
            sink: None,
            path: None,
            offset: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
            loop_at_end: false,
            info,
        };
        state.publish();
        let _ = ready.send(Ok(()));

        loop {
            match rx.recv_timeout(TICK) {
                Ok(Request { cmd, reply }) => {
                    let quit = matches!(cmd, EngineCmd::Quit { .. });
                    let result = state.handle(cmd);
                    state.tick();
                    state.publish();
                    let _ = reply.send(result);
                    if quit {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    state.tick();
                    state.publish();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("audio thread finished");
    })
}
