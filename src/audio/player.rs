use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::engine::{EngineError, PlaybackEngine};
use super::thread::spawn_audio_thread;
use super::types::{EngineCmd, PlaybackHandle, PlaybackInfo, Request};

/// Handle to the audio thread.
///
/// Every call waits for the thread to apply it, so the playback info is
/// current by the time the call returns.
pub struct RodioEngine {
    tx: Sender<Request>,
    playback: PlaybackHandle,
    join: Option<JoinHandle<()>>,
}

impl RodioEngine {
    /// Open the default output device on a new audio thread.
    pub fn spawn() -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let playback: PlaybackHandle = Arc::new(Mutex::new(PlaybackInfo::default()));

        let join = spawn_audio_thread(rx, playback.clone(), ready_tx);
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                playback,
                join: Some(join),
            }),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => Err(EngineError::Disconnected),
        }
    }

    pub fn playback_handle(&self) -> PlaybackHandle {
        self.playback.clone()
    }

    fn call(&self, cmd: EngineCmd) -> Result<(), EngineError> {
        let (reply, wait) = mpsc::channel();
        self.tx
            .send(Request { cmd, reply })
            .map_err(|_| EngineError::Disconnected)?;
        wait.recv().map_err(|_| EngineError::Disconnected)?
    }

    fn read<T>(&self, f: impl FnOnce(&PlaybackInfo) -> T) -> Option<T> {
        self.playback.lock().ok().map(|info| f(&info))
    }
}

impl PlaybackEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        self.call(EngineCmd::Load(path.to_path_buf()))
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.call(EngineCmd::Play)
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.call(EngineCmd::Pause)
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.call(EngineCmd::Resume)
    }

    fn seek_to(&mut self, position: Duration) -> Result<(), EngineError> {
        self.call(EngineCmd::SeekTo(position))
    }

    fn position(&self) -> Duration {
        self.read(|i| i.position).unwrap_or_default()
    }

    fn duration(&self) -> Duration {
        self.read(|i| i.duration).unwrap_or_default()
    }

    fn playing(&self) -> bool {
        self.read(|i| i.playing).unwrap_or(false)
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), EngineError> {
        self.call(EngineCmd::SetVolume(volume.clamp(0.0, 1.0) as f32))
    }

    fn set_loop_at_end(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.call(EngineCmd::SetLoopAtEnd(enabled))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.call(EngineCmd::Stop)
    }

    fn shutdown(&mut self, fade_out: Duration) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.call(EngineCmd::Quit {
            fade_out_ms: fade_out.as_millis() as u64,
        });
        let _ = join.join();
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.shutdown(Duration::ZERO);
    }
}
