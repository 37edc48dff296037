use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, info, warn};
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::library::{Thumbnail, Track};
use crate::notify::{NotificationSink, SinkError};
use crate::session::{PlaybackState, SessionSnapshot};

const PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.musicterm";
const POLL: Duration = Duration::from_millis(100);

/// Transport commands from the desktop, handled by the UI loop.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative offset in microseconds.
    Seek(i64),
    /// Absolute position in microseconds.
    SetPosition(i64),
    SetVolume(f64),
    SetLoop(bool),
}

/// Which properties the bus thread must announce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Changed {
    Status,
    Metadata,
    Volume,
    Loop,
}

#[derive(Debug, Default)]
struct SharedState {
    playback: PlaybackState,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    art_url: Option<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
    position_micros: i64,
    volume: f64,
    loop_at_end: bool,
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

/// Session-side handle to the MPRIS service.
///
/// Updates land in shared state right away; the bus thread picks up the
/// change notes and emits `PropertiesChanged`.
#[derive(Clone)]
pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<Changed>,
}

impl MprisHandle {
    fn announce(&self, changed: &[Changed]) -> Result<(), SinkError> {
        for &c in changed {
            self.notify.send(c).map_err(|_| SinkError::Disconnected)?;
        }
        Ok(())
    }

    pub fn set_playback(&self, playback: PlaybackState) {
        if let Ok(mut s) = self.state.lock() {
            s.playback = playback;
        }
    }

    /// Position is polled by clients, so this never emits a signal.
    pub fn set_position(&self, position: Duration) {
        if let Ok(mut s) = self.state.lock() {
            s.position_micros = micros(position);
        }
    }

    pub fn set_track_metadata(&self, index: Option<usize>, track: Option<&Track>) {
        let Ok(mut s) = self.state.lock() else {
            return;
        };
        match track {
            Some(t) => {
                s.title = Some(t.title.clone());
                s.artist = t.artists.clone();
                s.album = Some(t.album.clone());
                s.url = t.path.as_ref().map(|p| format!("file://{}", p.display()));
                s.art_url = match &t.thumbnail {
                    Some(Thumbnail::Cached(p)) => Some(format!("file://{}", p.display())),
                    Some(Thumbnail::Remote(url)) => Some(url.clone()),
                    None => None,
                };
                s.length_micros = (!t.duration.is_zero()).then(|| micros(t.duration));
                s.track_id = index
                    .and_then(|i| ObjectPath::try_from(format!("{PATH}/track/{i}")).ok())
                    .map(OwnedObjectPath::from);
            }
            None => {
                s.title = None;
                s.artist.clear();
                s.album = None;
                s.url = None;
                s.art_url = None;
                s.length_micros = None;
                s.track_id = None;
            }
        }
    }

    fn apply(&self, snapshot: &SessionSnapshot) {
        self.set_track_metadata(snapshot.current_index, snapshot.current.as_ref());
        self.set_playback(snapshot.state);
        self.set_position(snapshot.position);
        if let Ok(mut s) = self.state.lock() {
            s.volume = snapshot.volume;
            s.loop_at_end = snapshot.loop_at_end;
        }
    }
}

impl NotificationSink for MprisHandle {
    fn name(&self) -> &str {
        "mpris"
    }

    fn on_playback_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        self.apply(snapshot);
        self.announce(&[Changed::Metadata, Changed::Status, Changed::Loop])
    }

    fn on_play_pause_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        self.apply(snapshot);
        self.announce(&[Changed::Status])
    }

    fn on_volume_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        self.apply(snapshot);
        self.announce(&[Changed::Volume])
    }

    fn on_playlist_repopulated(
        &mut self,
        _tracks: &[Track],
        snapshot: &SessionSnapshot,
    ) -> Result<(), SinkError> {
        self.apply(snapshot);
        self.announce(&[Changed::Metadata])
    }

    fn on_current_index_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        self.apply(snapshot);
        self.announce(&[Changed::Metadata])
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for TUI.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "musicterm"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    /// Ignored unless `track_id` names the current track.
    fn set_position(&self, track_id: OwnedObjectPath, position: i64) {
        let current = self.state.lock().ok().and_then(|s| s.track_id.clone());
        if current.as_ref() != Some(&track_id) || position < 0 {
            debug!(track_id = track_id.as_str(), position, "stale SetPosition ignored");
            return;
        }
        let _ = self.tx.send(ControlCmd::SetPosition(position));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        s.playback.label()
    }

    #[zbus(property)]
    fn loop_status(&self) -> &str {
        match self.state.lock() {
            Ok(s) if s.loop_at_end => "Track",
            _ => "None",
        }
    }

    #[zbus(property)]
    fn set_loop_status(&mut self, value: String) {
        let _ = self.tx.send(ControlCmd::SetLoop(value != "None"));
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.state.lock().map(|s| s.volume).unwrap_or(0.0)
    }

    #[zbus(property)]
    fn set_volume(&mut self, value: f64) {
        let _ = self.tx.send(ControlCmd::SetVolume(value));
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> i64 {
        self.state.lock().map(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let mut put = |key: &str, value: Option<OwnedValue>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };
        put(
            "mpris:trackid",
            s.track_id
                .as_ref()
                .and_then(|p| owned(Value::from(p.clone().into_inner()))),
        );
        put(
            "xesam:title",
            owned(Value::from(s.title.clone().unwrap_or_default())),
        );
        if !s.artist.is_empty() {
            put("xesam:artist", owned(Value::from(s.artist.clone())));
        }
        put("xesam:album", s.album.clone().and_then(|a| owned(Value::from(a))));
        put("xesam:url", s.url.clone().and_then(|u| owned(Value::from(u))));
        put("mpris:artUrl", s.art_url.clone().and_then(|u| owned(Value::from(u))));
        put("mpris:length", s.length_micros.and_then(|l| owned(Value::from(l))));
        map
    }
}

/// Forward queued change notes as `PropertiesChanged` signals.
async fn announce_changes(
    iface_ref: &zbus::object_server::InterfaceRef<PlayerIface>,
    changed: &[Changed],
) {
    let iface = iface_ref.get().await;
    let emitter = iface_ref.signal_emitter();
    for c in changed {
        let result = match c {
            Changed::Status => iface.playback_status_changed(emitter).await,
            Changed::Metadata => iface.metadata_changed(emitter).await,
            Changed::Volume => iface.volume_changed(emitter).await,
            Changed::Loop => iface.loop_status_changed(emitter).await,
        };
        if let Err(e) = result {
            debug!(change = ?c, error = %e, "failed to emit PropertiesChanged");
        }
    }
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify_rx: Receiver<Changed>,
    ready: Sender<Result<(), String>>,
) -> zbus::Result<()> {
    let registered = async {
        let connection = Connection::session().await?;
        connection.request_name(BUS_NAME).await?;
        let object_server = connection.object_server();
        object_server.at(PATH, RootIface { tx: tx.clone() }).await?;
        object_server.at(PATH, PlayerIface { tx, state }).await?;
        let iface_ref = object_server.interface::<_, PlayerIface>(PATH).await?;
        Ok::<_, zbus::Error>((connection, iface_ref))
    }
    .await;

    let (_connection, iface_ref) = match registered {
        Ok(r) => {
            let _ = ready.send(Ok(()));
            r
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return Err(e);
        }
    };
    info!(name = BUS_NAME, "MPRIS service registered");

    loop {
        let mut changed: Vec<Changed> = Vec::new();
        loop {
            match notify_rx.try_recv() {
                Ok(c) => {
                    if !changed.contains(&c) {
                        changed.push(c);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if !changed.is_empty() {
            announce_changes(&iface_ref, &changed).await;
        }
        Timer::after(POLL).await;
    }
}

/// Start the MPRIS service on its own thread.
///
/// Fails when the session bus cannot be reached or the name is taken.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> Result<MprisHandle, SinkError> {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Changed>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let state_for_thread = state.clone();
    std::thread::Builder::new()
        .name("mpris".into())
        .spawn(move || {
            if let Err(e) = block_on(serve(tx, state_for_thread, notify_rx, ready_tx)) {
                warn!(error = %e, "MPRIS service stopped");
            }
        })
        .map_err(|e| SinkError::Unavailable(e.to_string()))?;

    match ready_rx.recv_timeout(Duration::from_secs(3)) {
        Ok(Ok(())) => Ok(MprisHandle {
            state,
            notify: notify_tx,
        }),
        Ok(Err(e)) => Err(SinkError::Unavailable(e)),
        Err(_) => Err(SinkError::Unavailable(
            "timed out waiting for the session bus".into(),
        )),
    }
}

#[cfg(test)]
mod tests;
