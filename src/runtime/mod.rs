use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use crate::app::{App, Tab};
use crate::config::SettingsStore;
use crate::search::SearchFilter;

mod event_loop;
mod mpris_sync;
mod startup;
mod worker;

/// Command-line choices that apply to this run only and are never saved.
#[derive(Debug, Default)]
pub struct Overrides {
    pub music_dir: Option<PathBuf>,
    pub filter: Option<SearchFilter>,
}

/// Build the session from `store`, run the terminal UI until quit, then
/// release the audio device.
pub fn run(store: SettingsStore, overrides: Overrides) -> Result<()> {
    let settings = store.settings().clone();
    let parts = startup::build(store, overrides.music_dir)?;

    let filter = overrides.filter.unwrap_or(settings.search.default_filter);
    let mut app = App::new(parts.session.tracks(), filter);
    if app.has_tracks() {
        app.set_tab(Tab::Playlist);
    }

    let (worker_tx, worker_rx) = mpsc::channel::<worker::WorkerMsg>();

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = {
        let ctx = event_loop::LoopContext {
            settings: &settings,
            session: &parts.session,
            playback: &parts.playback,
            mpris: parts.mpris.as_ref(),
            control_tx: &parts.control_tx,
            control_rx: &parts.control_rx,
            worker_tx: &worker_tx,
            worker_rx: &worker_rx,
        };
        let mut state = event_loop::EventLoopState::new();
        event_loop::run(&mut terminal, &ctx, &mut app, &mut state)
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("shutting down");
    parts
        .session
        .shutdown(Duration::from_millis(settings.audio.quit_fade_out_ms));

    run_result
}
