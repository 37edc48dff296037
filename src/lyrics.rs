//! Lyrics: LRC parsing for the lyrics view and the lookup service used by
//! the download pipeline.

mod lrc;
mod lrclib;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::library::Track;

pub use lrc::{LyricLine, Lyrics};
pub use lrclib::LrcLib;

#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("lyrics lookups are disabled")]
    Disabled,
    #[error("lyrics request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected lyrics response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Finds lyrics text for a track. `Ok(None)` means the service has none.
pub trait LyricsSource: Send + Sync {
    fn find(&self, track: &Track) -> Result<Option<String>, LyricsError>;
}

#[cfg(test)]
mod tests;
