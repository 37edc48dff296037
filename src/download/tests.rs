use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use super::pipeline::STAGING_DIR;
use super::*;
use crate::config::{LibrarySettings, PathSettings};
use crate::lyrics::{LyricsError, LyricsSource};

#[derive(Default)]
struct FakeFetcher {
    calls: Arc<AtomicUsize>,
    fail: bool,
    /// Cancel this token mid-fetch.
    cancel_during: Option<CancelToken>,
    /// Extension of the produced file, `mp3` when unset.
    extension: Option<&'static str>,
}

impl Fetcher for FakeFetcher {
    fn fetch(
        &self,
        track: &Track,
        staging: &Path,
        _cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ext = self.extension.unwrap_or("mp3");
        let out = staging.join(format!("{}.{ext}", track.remote_id));
        fs::write(&out, b"fake audio").unwrap();
        progress(5, 10);
        progress(10, 10);
        if let Some(token) = &self.cancel_during {
            token.cancel();
        }
        if self.fail {
            return Err(DownloadError::Fetcher {
                status: "exit status: 1".into(),
                detail: "ERROR: video unavailable".into(),
            });
        }
        Ok(out)
    }
}

struct FakeLyrics {
    text: Option<&'static str>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl LyricsSource for FakeLyrics {
    fn find(&self, _track: &Track) -> Result<Option<String>, LyricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LyricsError::Disabled);
        }
        Ok(self.text.map(str::to_string))
    }
}

fn paths(dir: &TempDir) -> PathSettings {
    let base = dir.path();
    PathSettings {
        music_dir: base.join("music"),
        lyrics_dir: base.join("lyrics"),
        cover_dir: base.join("covers"),
        log_dir: base.join("logs"),
        cache_dir: base.join("cache"),
    }
}

fn track(id: &str) -> Track {
    Track::remote(
        id,
        "Song",
        vec!["Artist".into()],
        None,
        Duration::from_secs(200),
        None,
    )
}

fn pipeline(dir: &TempDir, fetcher: FakeFetcher) -> DownloadPipeline {
    let paths = paths(dir);
    paths.ensure_all().unwrap();
    DownloadPipeline::new(
        &paths,
        &LibrarySettings::default(),
        "mp3",
        Box::new(fetcher),
    )
}

#[test]
fn download_is_idempotent_and_fetches_once() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let p = pipeline(
        &dir,
        FakeFetcher {
            calls: calls.clone(),
            ..FakeFetcher::default()
        },
    );

    let t = track("abc");
    let first = p.download(&t, &CancelToken::new(), &|_, _| {}).unwrap();
    let second = p.download(&t, &CancelToken::new(), &|_, _| {}).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, dir.path().join("music").join("abc.mp3"));
    assert!(first.is_file());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("music").join(STAGING_DIR).join("abc.mp3").exists());
}

#[test]
fn download_in_another_format_is_still_found_later() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let p = pipeline(
        &dir,
        FakeFetcher {
            calls: calls.clone(),
            extension: Some("opus"),
            ..FakeFetcher::default()
        },
    );

    let t = track("abc");
    let first = p.download(&t, &CancelToken::new(), &|_, _| {}).unwrap();
    let second = p.download(&t, &CancelToken::new(), &|_, _| {}).unwrap();

    assert_eq!(first, dir.path().join("music").join("abc.opus"));
    assert_eq!(second, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn download_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&dir, FakeFetcher::default());
    let seen = Mutex::new(Vec::new());
    p.download(&track("abc"), &CancelToken::new(), &|d, t| {
        seen.lock().unwrap().push((d, t))
    })
    .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(5, 10), (10, 10)]);
}

#[test]
fn fetch_failure_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        &dir,
        FakeFetcher {
            fail: true,
            ..FakeFetcher::default()
        },
    );
    let err = p
        .download(&track("abc"), &CancelToken::new(), &|_, _| {})
        .unwrap_err();
    assert!(matches!(err, DownloadError::Fetcher { .. }));
    assert!(!dir.path().join("music").join("abc.mp3").exists());
    assert!(!dir.path().join("music").join(STAGING_DIR).join("abc.mp3").exists());
}

#[test]
fn cancelled_before_start_does_not_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let p = pipeline(
        &dir,
        FakeFetcher {
            calls: calls.clone(),
            ..FakeFetcher::default()
        },
    );
    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
        p.download(&track("abc"), &token, &|_, _| {}),
        Err(DownloadError::Cancelled)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn cancelled_mid_fetch_is_not_published() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancelToken::new();
    let p = pipeline(
        &dir,
        FakeFetcher {
            cancel_during: Some(token.clone()),
            ..FakeFetcher::default()
        },
    );
    assert!(matches!(
        p.download(&track("abc"), &token, &|_, _| {}),
        Err(DownloadError::Cancelled)
    ));
    assert!(!dir.path().join("music").join("abc.mp3").exists());
}

#[test]
fn lyrics_are_saved_after_download() {
    let dir = tempfile::tempdir().unwrap();
    let lyrics_calls = Arc::new(AtomicUsize::new(0));
    let p = pipeline(&dir, FakeFetcher::default()).with_lyrics(Box::new(FakeLyrics {
        text: Some("[00:01.00]hello"),
        fail: false,
        calls: lyrics_calls.clone(),
    }));
    let t = track("abc");
    p.download(&t, &CancelToken::new(), &|_, _| {}).unwrap();

    let lrc = dir.path().join("lyrics").join("abc.lrc");
    assert_eq!(fs::read_to_string(&lrc).unwrap(), "[00:01.00]hello");

    // Already on disk: no second lookup.
    assert_eq!(p.fetch_lyrics(&t).unwrap(), lrc);
    assert_eq!(lyrics_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_lyrics_leave_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&dir, FakeFetcher::default()).with_lyrics(Box::new(FakeLyrics {
        text: None,
        fail: false,
        calls: Arc::default(),
    }));
    p.download(&track("abc"), &CancelToken::new(), &|_, _| {})
        .unwrap();
    let lrc = dir.path().join("lyrics").join("abc.lrc");
    assert_eq!(fs::read_to_string(lrc).unwrap(), "");
}

#[test]
fn lyrics_failure_does_not_fail_download() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&dir, FakeFetcher::default()).with_lyrics(Box::new(FakeLyrics {
        text: None,
        fail: true,
        calls: Arc::default(),
    }));
    let path = p
        .download(&track("abc"), &CancelToken::new(), &|_, _| {})
        .unwrap();
    assert!(path.is_file());
    assert!(!dir.path().join("lyrics").join("abc.lrc").exists());
}

#[test]
fn fetch_lyrics_without_source_is_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&dir, FakeFetcher::default());
    assert!(matches!(
        p.fetch_lyrics(&track("abc")),
        Err(LyricsError::Disabled)
    ));
}

#[test]
fn remove_sidecars_deletes_lyrics_and_covers() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&dir, FakeFetcher::default());
    let lrc = dir.path().join("lyrics").join("abc.lrc");
    let cover = dir.path().join("covers").join("abc.jpg");
    let other = dir.path().join("covers").join("xyz.jpg");
    fs::write(&lrc, "x").unwrap();
    fs::write(&cover, "x").unwrap();
    fs::write(&other, "x").unwrap();

    p.remove_sidecars(&track("abc"));
    assert!(!lrc.exists());
    assert!(!cover.exists());
    assert!(other.exists());

    // Nothing left to remove is fine.
    p.remove_sidecars(&track("abc"));
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let a = CancelToken::new();
    let b = a.clone();
    assert!(!b.is_cancelled());
    a.cancel();
    assert!(b.is_cancelled());
}

#[test]
fn every_artist_is_tagged_separately_and_read_back() {
    use lofty::prelude::*;
    use lofty::tag::{Tag, TagType};

    let mut tag = Tag::new(TagType::Id3v2);
    tag.set_artist("Old, Joined".to_string());

    let artists = vec!["Alice".to_string(), "Bob, Jr.".to_string()];
    super::tags::set_artists(&mut tag, &artists);

    assert_eq!(crate::library::tag_artists(&tag), artists);
}
