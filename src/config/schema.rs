use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::search::SearchFilter;

use super::load::default_data_dir;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/musicterm/config.toml` or `~/.config/musicterm/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `MUSICTERM__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub player: PlayerSettings,
    pub platform: PlatformSettings,
    pub paths: PathSettings,
    pub library: LibrarySettings,
    pub search: SearchSettings,
    pub download: DownloadSettings,
    pub notifications: NotificationSettings,
    pub controls: ControlsSettings,
    pub audio: AudioSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Output volume in `0.0..=1.0`.
    pub volume: f64,
    /// Restart the current track instead of stopping when it ends.
    pub loop_at_end: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            loop_at_end: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Platform id recorded on first run ("linux", "windows", "macos", "android").
    pub os: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            os: Platform::detect().id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub music_dir: PathBuf,
    pub lyrics_dir: PathBuf,
    pub cover_dir: PathBuf,
    pub log_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let base = default_data_dir();
        Self {
            music_dir: base.join("music"),
            lyrics_dir: base.join("lyrics"),
            cover_dir: base.join("covers"),
            log_dir: base.join("logs"),
            cache_dir: base.join("cache"),
        }
    }
}

impl PathSettings {
    /// Create every storage directory that does not exist yet.
    pub fn ensure_all(&self) -> std::io::Result<()> {
        for dir in [
            &self.music_dir,
            &self.lyrics_dir,
            &self.cover_dir,
            &self.log_dir,
            &self.cache_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "m4a".into(),
                "opus".into(),
                "flac".into(),
                "ogg".into(),
                "wav".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Base URL of the Piped API instance used for catalog search.
    pub api_url: String,
    pub default_filter: SearchFilter,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_url: "https://pipedapi.kavin.rocks".to_string(),
            default_filter: SearchFilter::Songs,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// `yt-dlp` executable, looked up on `PATH` unless absolute.
    pub ytdlp_path: String,
    /// Prefix the remote id is appended to when fetching.
    pub watch_url: String,
    pub audio_format: String,
    pub audio_quality: String,
    /// Fetch lyrics after every download.
    pub lyrics: bool,
    pub lyrics_api_url: String,
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            watch_url: "https://music.youtube.com/watch?v=".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            lyrics: true,
            lyrics_api_url: "https://lrclib.net".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Show a desktop bubble whenever a new track starts.
    pub desktop: bool,
    pub timeout_ms: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            desktop: false,
            timeout_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to seek when pressing `H` / `L`.
    pub seek_seconds: u64,
    /// Volume change applied by `+` / `-`.
    pub volume_step: f64,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            seek_seconds: 10,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Fade-out duration when quitting (milliseconds).
    /// Set to 0 to stop immediately.
    pub quit_fade_out_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            quit_fade_out_ms: 500,
        }
    }
}
