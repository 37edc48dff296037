use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::library::{Track, UNKNOWN_ALBUM};

use super::{LyricsError, LyricsSource};

/// Lyrics lookups against an LRCLIB instance.
pub struct LrcLib {
    client: reqwest::blocking::Client,
    api_url: String,
}

impl LrcLib {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, LyricsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("musicterm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrcLibRecord {
    #[serde(default)]
    synced_lyrics: Option<String>,
    #[serde(default)]
    plain_lyrics: Option<String>,
}

/// Synced lyrics win over plain ones; blank strings count as missing.
pub(super) fn pick_lyrics(body: &str) -> Result<Option<String>, serde_json::Error> {
    let record: LrcLibRecord = serde_json::from_str(body)?;
    let non_blank = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
    Ok(non_blank(record.synced_lyrics).or_else(|| non_blank(record.plain_lyrics)))
}

impl LyricsSource for LrcLib {
    fn find(&self, track: &Track) -> Result<Option<String>, LyricsError> {
        let mut query = vec![
            ("track_name", track.title.clone()),
            ("artist_name", track.primary_artist().to_string()),
        ];
        if track.album != UNKNOWN_ALBUM {
            query.push(("album_name", track.album.clone()));
        }
        if !track.duration.is_zero() {
            query.push(("duration", track.duration.as_secs().to_string()));
        }
        debug!(title = %track.title, artist = track.primary_artist(), "lyrics lookup");

        let response = self
            .client
            .get(format!("{}/api/get", self.api_url))
            .query(&query)
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.text()?;
        Ok(pick_lyrics(&body)?)
    }
}
