use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::{PlaybackHandle, RodioEngine};
use crate::config::SettingsStore;
use crate::download::{DownloadPipeline, YtDlpFetcher};
use crate::library::TrackRegistry;
use crate::lyrics::LrcLib;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::notify::{DesktopNotifier, media_session_for};
use crate::platform::Platform;
use crate::search::PipedSearch;
use crate::session::SessionController;

/// Everything the event loop needs, wired up.
pub struct Components {
    pub session: Arc<SessionController>,
    pub playback: PlaybackHandle,
    pub mpris: Option<MprisHandle>,
    pub control_tx: Sender<ControlCmd>,
    pub control_rx: Receiver<ControlCmd>,
}

/// The stored platform id, or the detected one when none is stored yet.
fn resolve_platform(store: &mut SettingsStore) -> Platform {
    let stored = store.settings().platform.os.trim().to_string();
    if !stored.is_empty() {
        return Platform::from_id(&stored);
    }
    let detected = Platform::detect();
    if let Err(e) = store.set_platform(detected.id()) {
        warn!(error = %e, "could not persist detected platform");
    }
    detected
}

pub fn build(mut store: SettingsStore, music_dir: Option<PathBuf>) -> Result<Components> {
    let platform = resolve_platform(&mut store);
    let mut settings = store.settings().clone();
    if let Some(dir) = music_dir {
        settings.paths.music_dir = dir;
    }
    let paths = &settings.paths;
    paths
        .ensure_all()
        .with_context(|| format!("creating data directories under {}", paths.music_dir.display()))?;

    let registry = TrackRegistry::open(
        paths.music_dir.clone(),
        Some(paths.cover_dir.clone()),
        settings.library.clone(),
    );

    let engine = RodioEngine::spawn().context("opening audio output")?;
    let playback = engine.playback_handle();

    let search = PipedSearch::new(&settings.search).context("building search client")?;

    let timeout = Duration::from_secs(settings.download.timeout_secs);
    let artwork = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("building artwork client")?;
    let mut downloads = DownloadPipeline::new(
        paths,
        &settings.library,
        &settings.download.audio_format,
        Box::new(YtDlpFetcher::new(&settings.download)),
    )
    .with_artwork(artwork);
    if settings.download.lyrics {
        let lyrics = LrcLib::new(&settings.download.lyrics_api_url, timeout)
            .context("building lyrics client")?;
        downloads = downloads.with_lyrics(Box::new(lyrics));
    }

    let session = Arc::new(SessionController::new(
        registry,
        Box::new(engine),
        store,
        Arc::new(search),
        Arc::new(downloads),
    ));

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let media = media_session_for(platform, control_tx.clone());
    let mpris = media.mpris();
    session.register_sink(media.into_sink());
    if settings.notifications.desktop && platform == Platform::Linux {
        session.register_sink(Box::new(DesktopNotifier::new(&settings.notifications)));
    }

    info!(%platform, music_dir = %paths.music_dir.display(), "startup complete");
    Ok(Components {
        session,
        playback,
        mpris,
        control_tx,
        control_rx,
    })
}
