use std::env;
use std::fmt;

/// Host platform, used to pick the media-session sink at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    /// Termux on Android.
    Android,
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        let termux = env::var("PREFIX")
            .map(|p| p.contains("com.termux"))
            .unwrap_or(false);
        if cfg!(target_os = "android") || termux {
            return Self::Android;
        }
        match env::consts::OS {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            _ => Self::Other,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Android => "android",
            Self::Other => "other",
        }
    }

    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" | "darwin" => Self::MacOs,
            "android" | "termux" => Self::Android,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
