use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::SearchSettings;
use crate::library::Track;

use super::{SearchError, SearchFilter, SearchProvider, validate_query};

/// Search backed by a Piped API instance.
pub struct PipedSearch {
    client: reqwest::blocking::Client,
    api_url: String,
}

impl PipedSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self, SearchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("musicterm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }
}

fn piped_filter(filter: SearchFilter) -> &'static str {
    match filter {
        SearchFilter::Songs => "music_songs",
        SearchFilter::Videos => "music_videos",
    }
}

impl SearchProvider for PipedSearch {
    fn search(&self, query: &str, filter: SearchFilter) -> Result<Vec<Track>, SearchError> {
        let query = validate_query(query)?;
        let body = self
            .client
            .get(format!("{}/search", self.api_url))
            .query(&[("q", query), ("filter", piped_filter(filter))])
            .send()?
            .error_for_status()?
            .text()?;
        let tracks = parse_response(&body)?;
        debug!(query, %filter, results = tracks.len(), "search finished");
        Ok(tracks)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    uploader_name: Option<String>,
    #[serde(default)]
    duration: i64,
}

/// `/watch?v=ID&...` -> `ID`
fn video_id(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("v=")?;
    let id = rest.split('&').next().unwrap_or(rest);
    (!id.is_empty()).then_some(id)
}

/// Auto-generated channels are named "Artist - Topic".
fn artist_from_uploader(name: &str) -> String {
    name.trim().trim_end_matches(" - Topic").trim().to_string()
}

pub(super) fn parse_response(body: &str) -> Result<Vec<Track>, SearchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter(|item| item.kind == "stream")
        .filter_map(|item| {
            let id = video_id(&item.url)?.to_string();
            let artists = item
                .uploader_name
                .as_deref()
                .map(artist_from_uploader)
                .into_iter()
                .collect();
            Some(Track::remote(
                id,
                item.title,
                artists,
                None,
                Duration::from_secs(item.duration.max(0) as u64),
                item.thumbnail,
            ))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_stops_at_extra_params() {
        assert_eq!(video_id("/watch?v=abc123"), Some("abc123"));
        assert_eq!(video_id("/watch?v=abc123&list=x"), Some("abc123"));
        assert_eq!(video_id("/channel/xyz"), None);
        assert_eq!(video_id("/watch?v="), None);
    }

    #[test]
    fn topic_suffix_is_stripped() {
        assert_eq!(artist_from_uploader("Daft Punk - Topic"), "Daft Punk");
        assert_eq!(artist_from_uploader("Someone"), "Someone");
    }
}
