use std::path::Path;
use std::time::Duration;

use super::fake::FakeEngine;
use super::sink::{open_source, probe_duration};
use super::types::PlaybackInfo;
use super::*;

#[test]
fn playback_info_defaults_to_idle() {
    let info = PlaybackInfo::default();
    assert_eq!(info.duration, Duration::ZERO);
    assert_eq!(info.position, Duration::ZERO);
    assert!(!info.playing);
}

#[test]
fn seek_relative_clamps_to_track_bounds() {
    let mut engine = FakeEngine::new();
    engine.load(Path::new("/music/a.mp3")).unwrap();
    engine.play().unwrap();
    engine.advance(Duration::from_secs(30));

    engine.seek_relative(-45.0).unwrap();
    assert_eq!(engine.position(), Duration::ZERO);

    engine.seek_relative(500.0).unwrap();
    assert_eq!(engine.position(), engine.duration());

    engine.seek_to(Duration::from_secs(10)).unwrap();
    engine.seek_relative(2.5).unwrap();
    assert_eq!(engine.position(), Duration::from_millis(12_500));
}

#[test]
fn seek_relative_rejects_non_finite_offsets() {
    let mut engine = FakeEngine::new();
    engine.state().duration = Duration::ZERO;
    engine.load(Path::new("/music/a.mp3")).unwrap();
    assert!(matches!(
        engine.seek_relative(f64::INFINITY),
        Err(EngineError::InvalidSeek(_))
    ));
}

#[test]
fn open_source_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mp3");
    assert!(matches!(
        open_source(&missing),
        Err(EngineError::Open { .. })
    ));
}

#[test]
fn open_source_reports_undecodable_file() {
    let dir = tempfile::tempdir().unwrap();
    let junk = dir.path().join("junk.mp3");
    std::fs::write(&junk, b"definitely not audio").unwrap();
    assert!(matches!(
        open_source(&junk),
        Err(EngineError::Decode { .. })
    ));
    assert_eq!(probe_duration(&junk), Duration::ZERO);
}
