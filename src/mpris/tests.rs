use super::*;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

fn make_track() -> Track {
    let mut track = Track::remote(
        "abc123",
        "Test Title",
        vec!["Test Artist".to_string(), "Guest".to_string()],
        Some("Test Album".to_string()),
        Duration::from_micros(1_234_567),
        Some("https://img.example/abc123.jpg".to_string()),
    );
    track.path = Some(PathBuf::from("/tmp/music/abc123.mp3"));
    track
}

fn snapshot(track: Option<Track>, state: PlaybackState) -> SessionSnapshot {
    SessionSnapshot {
        state,
        current_index: track.as_ref().map(|_| 7),
        playing: state == PlaybackState::Playing,
        position: Duration::from_secs(3),
        duration: Duration::from_secs(200),
        volume: 0.4,
        muted: false,
        loop_at_end: true,
        track_count: 8,
        revision: 1,
        current: track,
    }
}

fn handle() -> (MprisHandle, Arc<Mutex<SharedState>>, Receiver<Changed>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Changed>();
    let handle = MprisHandle {
        state: state.clone(),
        notify: notify_tx,
    };
    (handle, state, notify_rx)
}

#[test]
fn set_track_metadata_sets_and_clears_shared_state() {
    let (handle, state, _rx) = handle();

    let track = make_track();
    handle.set_track_metadata(Some(7), Some(&track));

    {
        let s = state.lock().unwrap();
        assert_eq!(s.title.as_deref(), Some("Test Title"));
        assert_eq!(s.artist, vec!["Test Artist".to_string(), "Guest".to_string()]);
        assert_eq!(s.album.as_deref(), Some("Test Album"));
        assert!(s.url.as_deref().unwrap().contains("/tmp/music/abc123.mp3"));
        assert_eq!(s.art_url.as_deref(), Some("https://img.example/abc123.jpg"));
        assert_eq!(s.length_micros, Some(1_234_567));
        assert_eq!(
            s.track_id.as_ref().map(|p| p.as_str()),
            Some("/org/mpris/MediaPlayer2/track/7")
        );
    }

    handle.set_track_metadata(None, None);
    {
        let s = state.lock().unwrap();
        assert_eq!(s.title, None);
        assert!(s.artist.is_empty());
        assert_eq!(s.album, None);
        assert_eq!(s.url, None);
        assert_eq!(s.length_micros, None);
        assert!(s.track_id.is_none());
    }
}

#[test]
fn playback_status_maps_state_to_mpris_strings() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (tx, _rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        state: state.clone(),
    };

    for (playback, expected) in [
        (PlaybackState::Empty, "Stopped"),
        (PlaybackState::Stopped, "Stopped"),
        (PlaybackState::Playing, "Playing"),
        (PlaybackState::Paused, "Paused"),
    ] {
        state.lock().unwrap().playback = playback;
        assert_eq!(iface.playback_status(), expected);
    }
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (tx, _rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        state: state.clone(),
    };

    {
        let mut s = state.lock().unwrap();
        s.title = Some("Title".to_string());
        s.artist = vec!["Artist".to_string()];
        s.album = Some("Album".to_string());
        s.url = Some("file:///tmp/test.mp3".to_string());
        s.art_url = Some("file:///tmp/covers/test.jpg".to_string());
        s.length_micros = Some(42);
        s.track_id = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/1")
            .ok()
            .map(OwnedObjectPath::from);
    }

    let map = iface.metadata();
    for k in [
        "mpris:trackid",
        "xesam:title",
        "xesam:artist",
        "xesam:album",
        "xesam:url",
        "mpris:artUrl",
        "mpris:length",
    ] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn playback_changed_fills_state_and_queues_signals() {
    let (mut handle, state, rx) = handle();

    handle
        .on_playback_changed(&snapshot(Some(make_track()), PlaybackState::Playing))
        .unwrap();

    {
        let s = state.lock().unwrap();
        assert_eq!(s.playback, PlaybackState::Playing);
        assert_eq!(s.position_micros, 3_000_000);
        assert_eq!(s.volume, 0.4);
        assert!(s.loop_at_end);
    }
    let queued: Vec<Changed> = rx.try_iter().collect();
    assert_eq!(queued, vec![Changed::Metadata, Changed::Status, Changed::Loop]);
}

#[test]
fn sink_reports_disconnect_when_bus_thread_is_gone() {
    let (mut handle, _state, rx) = handle();
    drop(rx);
    let result = handle.on_volume_changed(&snapshot(None, PlaybackState::Stopped));
    assert!(matches!(result, Err(SinkError::Disconnected)));
}

#[test]
fn transport_methods_forward_commands() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (tx, rx) = mpsc::channel::<ControlCmd>();
    let mut iface = PlayerIface { tx, state };

    iface.play_pause();
    iface.next();
    iface.seek(-5_000_000);
    iface.set_volume(0.25);
    iface.set_loop_status("Track".to_string());
    iface.set_loop_status("None".to_string());

    let got: Vec<ControlCmd> = rx.try_iter().collect();
    assert_eq!(
        got,
        vec![
            ControlCmd::PlayPause,
            ControlCmd::Next,
            ControlCmd::Seek(-5_000_000),
            ControlCmd::SetVolume(0.25),
            ControlCmd::SetLoop(true),
            ControlCmd::SetLoop(false),
        ]
    );
}

#[test]
fn set_position_requires_current_track_id() {
    let (handle, state, _notify) = handle();
    handle.set_track_metadata(Some(2), Some(&make_track()));
    let (tx, rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface { tx, state };

    let current = OwnedObjectPath::try_from("/org/mpris/MediaPlayer2/track/2").unwrap();
    let other = OwnedObjectPath::try_from("/org/mpris/MediaPlayer2/track/9").unwrap();
    iface.set_position(other, 1_000_000);
    iface.set_position(current, 2_000_000);

    let got: Vec<ControlCmd> = rx.try_iter().collect();
    assert_eq!(got, vec![ControlCmd::SetPosition(2_000_000)]);
}
