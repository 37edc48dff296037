//! Download pipeline: turns a remote track into a tagged local file inside the
//! music directory, plus the lyrics and cover sidecars that go with it.

mod pipeline;
mod tags;
mod ytdlp;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::library::Track;

pub use pipeline::DownloadPipeline;
pub use ytdlp::YtDlpFetcher;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("fetcher exited with {status}: {detail}")]
    Fetcher { status: String, detail: String },
    #[error("fetcher produced no audio file for {0}")]
    NoOutput(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Shared flag asking an in-flight download to give up.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback: `(bytes_downloaded, bytes_total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Fetches the audio of a remote track into a staging directory.
pub trait Fetcher: Send + Sync {
    /// Returns the path of the produced file, which must live in `staging`.
    fn fetch(
        &self,
        track: &Track,
        staging: &Path,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError>;
}

#[cfg(test)]
mod tests;
