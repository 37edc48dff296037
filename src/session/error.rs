use thiserror::Error;

use crate::audio::EngineError;
use crate::download::DownloadError;
use crate::library::RegistryError;
use crate::search::SearchError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    Validation(String),
    #[error("index {index} is out of range (registry holds {len})")]
    NotFound { index: usize, len: usize },
    #[error("no tracks available")]
    EmptyRegistry,
    #[error("no search result with id {0}")]
    UnknownTrack(String),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("playback failed: {0}")]
    Adapter(#[from] EngineError),
    #[error("a newer play command took over")]
    Superseded,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl SessionError {
    /// Whether the UI should show this to the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Superseded)
    }
}
