use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{LibrarySettings, PathSettings};
use crate::library::{Thumbnail, Track, is_audio_file};
use crate::lyrics::{LyricsError, LyricsSource};

use super::tags::write_tags;
use super::{CancelToken, DownloadError, Fetcher, ProgressFn};

/// Hidden directory inside the music dir where half-finished files live.
pub const STAGING_DIR: &str = ".partial";

const COVER_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// Fetch, tag and publish audio files, plus their lyrics and covers.
pub struct DownloadPipeline {
    music_dir: PathBuf,
    lyrics_dir: PathBuf,
    cover_dir: PathBuf,
    format: String,
    library: LibrarySettings,
    fetcher: Box<dyn Fetcher>,
    lyrics: Option<Box<dyn LyricsSource>>,
    artwork: Option<reqwest::blocking::Client>,
}

impl DownloadPipeline {
    pub fn new(
        paths: &PathSettings,
        library: &LibrarySettings,
        format: &str,
        fetcher: Box<dyn Fetcher>,
    ) -> Self {
        Self {
            music_dir: paths.music_dir.clone(),
            lyrics_dir: paths.lyrics_dir.clone(),
            cover_dir: paths.cover_dir.clone(),
            format: format.trim_start_matches('.').to_string(),
            library: library.clone(),
            fetcher,
            lyrics: None,
            artwork: None,
        }
    }

    /// Fetch lyrics from `source` after every download.
    pub fn with_lyrics(mut self, source: Box<dyn LyricsSource>) -> Self {
        self.lyrics = Some(source);
        self
    }

    /// Download cover art for remote thumbnails with `client`.
    pub fn with_artwork(mut self, client: reqwest::blocking::Client) -> Self {
        self.artwork = Some(client);
        self
    }

    fn local_path(&self, track: &Track) -> PathBuf {
        self.music_dir
            .join(format!("{}.{}", track.remote_id, self.format))
    }

    /// The published audio file of `track`, whichever audio extension the
    /// fetcher ended up producing.
    fn existing_path(&self, track: &Track) -> Option<PathBuf> {
        let preferred = self.local_path(track);
        if preferred.is_file() {
            return Some(preferred);
        }
        fs::read_dir(&self.music_dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                let stem = path.file_stem().and_then(|s| s.to_str());
                path.is_file()
                    && stem == Some(track.remote_id.as_str())
                    && is_audio_file(path, &self.library)
            })
    }

    pub fn lyrics_path(&self, track: &Track) -> PathBuf {
        self.lyrics_dir.join(format!("{}.lrc", track.remote_id))
    }

    fn staging_dir(&self) -> PathBuf {
        self.music_dir.join(STAGING_DIR)
    }

    /// Materialize `track` in the music directory and return its path.
    ///
    /// Returns at once when the file is already there. Tagging, artwork and
    /// lyrics are best-effort; only fetching and publishing can fail.
    pub fn download(
        &self,
        track: &Track,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError> {
        if let Some(existing) = self.existing_path(track) {
            debug!(id = %track.remote_id, path = %existing.display(), "already downloaded");
            return Ok(existing);
        }
        let target = self.local_path(track);
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let staging = self.staging_dir();
        fs::create_dir_all(&staging).map_err(|e| DownloadError::io(&staging, e))?;

        let staged = match self.fetcher.fetch(track, &staging, cancel, progress) {
            Ok(p) => p,
            Err(e) => {
                self.clear_staging(track);
                return Err(e);
            }
        };
        if cancel.is_cancelled() {
            self.clear_staging(track);
            return Err(DownloadError::Cancelled);
        }

        let cover = self.cache_cover(track);
        if let Err(e) = write_tags(&staged, track, cover.as_deref()) {
            warn!(id = %track.remote_id, error = %e, "failed to write tags");
        }

        let target = match staged.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext != self.format => {
                self.music_dir.join(format!("{}.{ext}", track.remote_id))
            }
            _ => target,
        };
        publish(&staged, &target)?;
        info!(id = %track.remote_id, path = %target.display(), "download finished");

        if self.lyrics.is_some() {
            if let Err(e) = self.fetch_lyrics(track) {
                warn!(id = %track.remote_id, error = %e, "failed to fetch lyrics");
            }
        }

        Ok(target)
    }

    /// Make sure `<lyrics_dir>/<id>.lrc` exists, asking the lyrics service if needed.
    ///
    /// When the service has nothing an empty file is written so the lookup is
    /// not repeated.
    pub fn fetch_lyrics(&self, track: &Track) -> Result<PathBuf, LyricsError> {
        let path = self.lyrics_path(track);
        if path.is_file() {
            return Ok(path);
        }
        let source = self.lyrics.as_ref().ok_or(LyricsError::Disabled)?;
        let text = source.find(track)?.unwrap_or_default();
        let io_err = |source| LyricsError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.lyrics_dir).map_err(io_err)?;
        fs::write(&path, text.as_bytes()).map_err(io_err)?;
        debug!(id = %track.remote_id, found = !text.is_empty(), "lyrics saved");
        Ok(path)
    }

    /// Delete the lyrics and cached cover that belong to `track`.
    pub fn remove_sidecars(&self, track: &Track) {
        let mut paths = vec![self.lyrics_path(track)];
        paths.extend(
            COVER_EXTENSIONS
                .iter()
                .map(|ext| self.cover_dir.join(format!("{}.{ext}", track.remote_id))),
        );
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "sidecar removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove sidecar"),
            }
        }
    }

    fn clear_staging(&self, track: &Track) {
        let Ok(entries) = fs::read_dir(self.staging_dir()) else {
            return;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if name.starts_with(&format!("{}.", track.remote_id)) {
                let _ = fs::remove_file(&path);
            }
        }
    }

    /// Cover path for tagging: the cached one, or a fresh download of the thumbnail.
    fn cache_cover(&self, track: &Track) -> Option<PathBuf> {
        if let Some(Thumbnail::Cached(path)) = &track.thumbnail {
            return Some(path.clone());
        }
        let url = track.thumbnail_url()?;
        let client = self.artwork.as_ref()?;
        match self.fetch_cover(client, url, &track.remote_id) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(id = %track.remote_id, error = %e, "failed to fetch artwork");
                None
            }
        }
    }

    fn fetch_cover(
        &self,
        client: &reqwest::blocking::Client,
        url: &str,
        id: &str,
    ) -> anyhow::Result<PathBuf> {
        let response = client
            .get(url)
            .timeout(Duration::from_secs(15))
            .send()?
            .error_for_status()?;
        let ext = match response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(ct) if ct.contains("png") => "png",
            Some(ct) if ct.contains("webp") => "webp",
            _ => "jpg",
        };
        let bytes = response.bytes()?;
        fs::create_dir_all(&self.cover_dir)?;
        let path = self.cover_dir.join(format!("{id}.{ext}"));
        fs::write(&path, &bytes)?;
        Ok(path)
    }
}

/// fsync the staged file, then move it into place.
fn publish(staged: &Path, target: &Path) -> Result<(), DownloadError> {
    fs::File::open(staged)
        .and_then(|f| f.sync_all())
        .map_err(|e| DownloadError::io(staged, e))?;
    fs::rename(staged, target).map_err(|e| DownloadError::io(target, e))
}
