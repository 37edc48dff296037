use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;

use async_io::block_on;
use tracing::debug;
use zbus::Connection;
use zvariant::Value;

use crate::config::NotificationSettings;
use crate::library::Thumbnail;
use crate::session::SessionSnapshot;

use super::{NotificationSink, SinkError};

const NOTIFICATIONS: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";
const APP_NAME: &str = "musicterm";

/// "Now playing" desktop bubbles through the freedesktop notification service.
///
/// Each bubble is sent from its own short-lived thread so a slow
/// notification daemon never holds up the session.
#[derive(Debug)]
pub struct DesktopNotifier {
    timeout_ms: u32,
    last_shown: Option<String>,
}

/// What one bubble shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bubble {
    pub summary: String,
    pub body: String,
    pub icon: Option<PathBuf>,
}

impl DesktopNotifier {
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            timeout_ms: settings.timeout_ms,
            last_shown: None,
        }
    }

    /// Build the bubble for a fresh track, or `None` when it was already shown.
    pub(crate) fn bubble_for(&mut self, snapshot: &SessionSnapshot) -> Option<Bubble> {
        let track = snapshot.current.as_ref()?;
        if !snapshot.playing || self.last_shown.as_deref() == Some(track.remote_id.as_str()) {
            return None;
        }
        self.last_shown = Some(track.remote_id.clone());
        let icon = match &track.thumbnail {
            Some(Thumbnail::Cached(path)) => Some(path.clone()),
            _ => None,
        };
        Some(Bubble {
            summary: track.title.clone(),
            body: format!("{}\n{}", track.artist_line(), track.album),
            icon,
        })
    }
}

/// One `Notify` call on the session bus.
async fn send_bubble(bubble: &Bubble, timeout_ms: u32) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    let icon = bubble.icon.as_deref().and_then(Path::to_str).unwrap_or("");
    let actions: Vec<&str> = Vec::new();
    let hints: HashMap<&str, Value<'_>> = HashMap::new();
    let expire = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
    connection
        .call_method(
            Some(NOTIFICATIONS),
            NOTIFICATIONS_PATH,
            Some(NOTIFICATIONS),
            "Notify",
            &(
                APP_NAME,
                0u32,
                icon,
                bubble.summary.as_str(),
                bubble.body.as_str(),
                actions,
                hints,
                expire,
            ),
        )
        .await?;
    Ok(())
}

impl NotificationSink for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    fn on_playback_changed(&mut self, snapshot: &SessionSnapshot) -> Result<(), SinkError> {
        let Some(bubble) = self.bubble_for(snapshot) else {
            return Ok(());
        };
        let timeout = self.timeout_ms;
        let spawned = thread::Builder::new().name("notify".into()).spawn(move || {
            if let Err(e) = block_on(send_bubble(&bubble, timeout)) {
                debug!(error = %e, "desktop notification failed");
            }
        });
        spawned
            .map(drop)
            .map_err(|e| SinkError::Failed(format!("notification thread: {e}")))
    }
}
