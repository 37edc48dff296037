use std::io;
use std::path::PathBuf;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::debug;

use crate::config::LibrarySettings;

use super::model::Track;
use super::scan::scan;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no track at index {index} (registry holds {len})")]
    NotFound { index: usize, len: usize },
    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Ordered list of the tracks present in the music directory.
///
/// Order is whatever the directory listing gave us until a shuffle permutes it.
/// Duplicated remote ids are impossible since the id is the file stem.
#[derive(Debug)]
pub struct TrackRegistry {
    music_dir: PathBuf,
    cover_dir: Option<PathBuf>,
    settings: LibrarySettings,
    tracks: Vec<Track>,
}

impl TrackRegistry {
    /// Open the registry for `music_dir` and run the initial scan.
    pub fn open(music_dir: PathBuf, cover_dir: Option<PathBuf>, settings: LibrarySettings) -> Self {
        let mut registry = Self {
            music_dir,
            cover_dir,
            settings,
            tracks: Vec::new(),
        };
        registry.refresh();
        registry
    }

    /// Rescan the music directory, replacing the current list.
    pub fn refresh(&mut self) {
        self.tracks = scan(&self.music_dir, self.cover_dir.as_deref(), &self.settings);
        debug!(dir = %self.music_dir.display(), count = self.tracks.len(), "registry refreshed");
    }

    pub fn list(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, remote_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.remote_id == remote_id)
    }

    /// Randomly permute the list in place.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tracks.shuffle(rng);
    }

    /// Remove the track at `index` from the list and delete its audio file.
    ///
    /// A file that is already gone is not an error.
    pub fn delete(&mut self, index: usize) -> Result<Track, RegistryError> {
        if index >= self.tracks.len() {
            return Err(RegistryError::NotFound {
                index,
                len: self.tracks.len(),
            });
        }

        if let Some(path) = self.tracks[index].path.clone() {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(RegistryError::Delete { path, source }),
            }
        }

        Ok(self.tracks.remove(index))
    }
}
