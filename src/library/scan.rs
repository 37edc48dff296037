use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::prelude::*;
use lofty::tag::{ItemKey, Tag};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::model::{Thumbnail, Track, normalize_album, normalize_artists};

const COVER_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

pub(crate) fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn cached_cover(cover_dir: Option<&Path>, remote_id: &str) -> Option<PathBuf> {
    let dir = cover_dir?;
    COVER_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{remote_id}.{ext}")))
        .find(|p| p.is_file())
}

/// Every `TrackArtist` value in `tag`, in order.
pub(crate) fn tag_artists(tag: &Tag) -> Vec<String> {
    tag.items()
        .filter(|item| matches!(item.key(), ItemKey::TrackArtist))
        .filter_map(|item| item.value().text())
        .map(str::to_string)
        .collect()
}

/// Read one audio file into a `Track`. The file stem is the remote id.
pub(super) fn read_track(path: &Path, cover_dir: Option<&Path>) -> Track {
    let remote_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();

    let mut title = remote_id.clone();
    let mut artists: Vec<String> = Vec::new();
    let mut album: Option<String> = None;
    let mut duration = Duration::ZERO;

    if let Ok(tagged) = lofty::read_from_path(path) {
        duration = tagged.properties().duration();

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            if let Some(v) = tag.title() {
                if !v.trim().is_empty() {
                    title = v.trim().to_string();
                }
            }
            artists = tag_artists(tag);
            album = tag.album().map(|v| v.to_string());
        }
    }

    let thumbnail = cached_cover(cover_dir, &remote_id).map(Thumbnail::Cached);

    Track {
        remote_id,
        title,
        artists: normalize_artists(artists),
        album: normalize_album(album),
        duration,
        path: Some(path.to_path_buf()),
        thumbnail,
    }
}

/// List the audio files directly inside `dir`, in directory enumeration order.
///
/// Hidden entries are skipped, which also keeps the download staging area out.
pub(super) fn scan(dir: &Path, cover_dir: Option<&Path>, settings: &LibrarySettings) -> Vec<Track> {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path(), settings))
        .map(|entry| read_track(entry.path(), cover_dir))
        .collect()
}
