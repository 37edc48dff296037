//! Catalog search: the provider seam and the Piped-backed implementation.

mod piped;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::Track;

pub use piped::PipedSearch;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search input: {0}")]
    Validation(String),
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected search response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which kind of catalog entries a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFilter {
    #[default]
    Songs,
    Videos,
}

impl SearchFilter {
    pub fn toggle(self) -> Self {
        match self {
            Self::Songs => Self::Videos,
            Self::Videos => Self::Songs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Songs => "songs",
            Self::Videos => "videos",
        }
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchFilter {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "songs" | "song" => Ok(Self::Songs),
            "videos" | "video" => Ok(Self::Videos),
            other => Err(SearchError::Validation(format!(
                "unknown search filter {other:?} (expected \"songs\" or \"videos\")"
            ))),
        }
    }
}

/// Returns remote-only tracks in provider ranking order.
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &str, filter: SearchFilter) -> Result<Vec<Track>, SearchError>;
}

/// Trim the query and reject blank ones.
pub fn validate_query(query: &str) -> Result<&str, SearchError> {
    let q = query.trim();
    if q.is_empty() {
        Err(SearchError::Validation("query must not be empty".to_string()))
    } else {
        Ok(q)
    }
}

#[cfg(test)]
mod tests;
