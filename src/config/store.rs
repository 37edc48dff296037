use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::schema::Settings;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to serialise settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loaded settings plus the file they are persisted to.
///
/// Every mutation rewrites the whole file before returning.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Settings,
    notice: Option<String>,
}

impl SettingsStore {
    /// Load the store from `path`.
    ///
    /// A missing file is created with defaults. A file that fails to parse or
    /// validate is replaced by defaults in memory and a notice is kept for the
    /// caller to report once logging is up.
    pub fn open(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::in_memory(Settings::default());
        };

        if !path.exists() {
            let store = Self {
                path: Some(path),
                settings: Settings::default(),
                notice: None,
            };
            if let Err(e) = store.save() {
                warn!(error = %e, "could not create default settings file");
            }
            return store;
        }

        let (settings, notice) = match Settings::load_from(Some(&path)) {
            Ok(s) => match s.validate() {
                Ok(()) => (s, None),
                Err(msg) => (
                    Settings::default(),
                    Some(format!("invalid config, using defaults: {msg}")),
                ),
            },
            Err(e) => (
                Settings::default(),
                Some(format!("failed to load config, using defaults: {e}")),
            ),
        };

        Self {
            path: Some(path),
            settings,
            notice,
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings,
            notice: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The load problem found by `open`, if any. Returned once.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn set_volume(&mut self, volume: f64) -> Result<(), SettingsError> {
        self.settings.player.volume = volume;
        self.save()
    }

    pub fn set_loop_at_end(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.settings.player.loop_at_end = enabled;
        self.save()
    }

    pub fn set_platform(&mut self, os: &str) -> Result<(), SettingsError> {
        self.settings.platform.os = os.to_string();
        self.save()
    }

    /// Write the settings next to the target and rename over it.
    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = toml::to_string_pretty(&self.settings)?;
        write_atomic(path, body.as_bytes()).map_err(|source| SettingsError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
