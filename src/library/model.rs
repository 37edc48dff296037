use std::path::PathBuf;
use std::time::Duration;

use super::display::make_display;

/// Artist placeholder used whenever a source has no artist at all.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Album placeholder used whenever a source has no album.
pub const UNKNOWN_ALBUM: &str = "Unknown";

/// Where a track's cover image can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// Remote image URL reported by the search provider.
    Remote(String),
    /// Cover cached on disk by the download pipeline.
    Cached(PathBuf),
}

/// One piece of audio content, either remote-only or materialized on disk.
///
/// A track without `path` comes from a search and cannot be played until the
/// download pipeline has produced a local file for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub remote_id: String,
    pub title: String,
    /// Never empty; falls back to [`UNKNOWN_ARTIST`].
    pub artists: Vec<String>,
    pub album: String,
    pub duration: Duration,
    pub path: Option<PathBuf>,
    pub thumbnail: Option<Thumbnail>,
}

impl Track {
    /// Build a remote-only track from search metadata, normalising missing fields.
    pub fn remote(
        remote_id: impl Into<String>,
        title: impl Into<String>,
        artists: Vec<String>,
        album: Option<String>,
        duration: Duration,
        thumbnail_url: Option<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
            artists: normalize_artists(artists),
            album: normalize_album(album),
            duration,
            path: None,
            thumbnail: thumbnail_url
                .filter(|u| !u.trim().is_empty())
                .map(Thumbnail::Remote),
        }
    }

    /// True once the track has a backing local file.
    pub fn is_local(&self) -> bool {
        self.path.is_some()
    }

    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ARTIST)
    }

    /// All artists joined with ", ".
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// "Artist - Title" as shown in lists.
    pub fn display(&self) -> String {
        make_display(&self.title, &self.artist_line())
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        match &self.thumbnail {
            Some(Thumbnail::Remote(url)) => Some(url),
            _ => None,
        }
    }
}

pub(crate) fn normalize_artists(artists: Vec<String>) -> Vec<String> {
    let artists: Vec<String> = artists
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if artists.is_empty() {
        vec![UNKNOWN_ARTIST.to_string()]
    } else {
        artists
    }
}

pub(crate) fn normalize_album(album: Option<String>) -> String {
    album
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
}
