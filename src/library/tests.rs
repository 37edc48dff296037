use std::fs;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

use super::display::make_display;
use super::*;
use crate::config::LibrarySettings;

fn registry_with(names: &[&str]) -> (tempfile::TempDir, TrackRegistry) {
    let dir = tempdir().unwrap();
    for n in names {
        fs::write(dir.path().join(format!("{n}.mp3")), b"not real").unwrap();
    }
    let reg = TrackRegistry::open(dir.path().to_path_buf(), None, LibrarySettings::default());
    (dir, reg)
}

#[test]
fn make_display_drops_empty_artist() {
    assert_eq!(make_display("Song", "Artist"), "Artist - Song");
    assert_eq!(make_display("Song", "  "), "Song");
}

#[test]
fn format_time_switches_to_hours() {
    assert_eq!(format_time(Duration::from_secs(0)), "0:00");
    assert_eq!(format_time(Duration::from_secs(65)), "1:05");
    assert_eq!(format_time(Duration::from_secs(3725)), "1:02:05");
}

#[test]
fn remote_track_normalises_missing_metadata() {
    let t = Track::remote(
        "id1",
        "Title",
        vec!["  ".into()],
        None,
        Duration::from_secs(3),
        Some(String::new()),
    );
    assert_eq!(t.artists, vec![UNKNOWN_ARTIST.to_string()]);
    assert_eq!(t.album, UNKNOWN_ALBUM);
    assert!(t.thumbnail.is_none());
    assert!(!t.is_local());
    assert_eq!(t.display(), "Unknown Artist - Title");
}

#[test]
fn remote_track_joins_artists() {
    let t = Track::remote(
        "id1",
        "Title",
        vec!["A".into(), "B".into()],
        Some("Album".into()),
        Duration::ZERO,
        Some("https://img/x.jpg".into()),
    );
    assert_eq!(t.artist_line(), "A, B");
    assert_eq!(t.primary_artist(), "A");
    assert_eq!(t.thumbnail_url(), Some("https://img/x.jpg"));
}

#[test]
fn open_lists_every_audio_file_once() {
    let (_dir, reg) = registry_with(&["a", "b", "c"]);
    assert_eq!(reg.len(), 3);
    let mut ids: Vec<&str> = reg.list().iter().map(|t| t.remote_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(reg.list().iter().all(Track::is_local));
}

#[test]
fn empty_directory_gives_empty_registry() {
    let (_dir, reg) = registry_with(&[]);
    assert!(reg.is_empty());
    assert!(reg.get(0).is_none());
}

#[test]
fn missing_directory_gives_empty_registry() {
    let dir = tempdir().unwrap();
    let reg = TrackRegistry::open(
        dir.path().join("nope"),
        None,
        LibrarySettings::default(),
    );
    assert!(reg.is_empty());
}

#[test]
fn refresh_picks_up_new_files() {
    let (dir, mut reg) = registry_with(&["a"]);
    fs::write(dir.path().join("b.mp3"), b"x").unwrap();
    assert_eq!(reg.len(), 1);
    reg.refresh();
    assert_eq!(reg.len(), 2);
    assert!(reg.position_of("b").is_some());
}

#[test]
fn shuffle_is_a_permutation() {
    let (_dir, mut reg) = registry_with(&["a", "b", "c", "d", "e"]);
    let mut before: Vec<String> = reg.list().iter().map(|t| t.remote_id.clone()).collect();
    reg.shuffle_with(&mut StdRng::seed_from_u64(7));
    let mut after: Vec<String> = reg.list().iter().map(|t| t.remote_id.clone()).collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}

#[test]
fn delete_removes_entry_and_file() {
    let (dir, mut reg) = registry_with(&["a", "b"]);
    let idx = reg.position_of("a").unwrap();
    let removed = reg.delete(idx).unwrap();
    assert_eq!(removed.remote_id, "a");
    assert_eq!(reg.len(), 1);
    assert!(!dir.path().join("a.mp3").exists());
    assert!(dir.path().join("b.mp3").exists());
}

#[test]
fn delete_tolerates_already_missing_file() {
    let (dir, mut reg) = registry_with(&["a"]);
    fs::remove_file(dir.path().join("a.mp3")).unwrap();
    assert!(reg.delete(0).is_ok());
    assert!(reg.is_empty());
}

#[test]
fn delete_out_of_range_is_not_found() {
    let (_dir, mut reg) = registry_with(&["a"]);
    match reg.delete(5) {
        Err(RegistryError::NotFound { index, len }) => {
            assert_eq!(index, 5);
            assert_eq!(len, 1);
        }
        other => panic!("unexpected: {other:?}"),
    }
}
