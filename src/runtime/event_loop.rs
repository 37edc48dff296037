use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{debug, warn};

use crate::app::{App, InputMode, Tab};
use crate::audio::PlaybackHandle;
use crate::config::Settings;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::runtime::mpris_sync::update_mpris;
use crate::runtime::worker::{self, WorkerMsg};
use crate::session::{PlaybackState, SessionController, SessionError};
use crate::ui;

const TICK: Duration = Duration::from_millis(100);

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Session revision the app model was last synced from.
    last_revision: Option<u64>,
    /// Track whose lyrics were last requested.
    lyrics_for: Option<String>,
    /// Internal two-key prefix state used for `gg` handling.
    pending_gg: bool,
}

impl EventLoopState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Shared handles the loop works with.
pub struct LoopContext<'a> {
    pub settings: &'a Settings,
    pub session: &'a Arc<SessionController>,
    pub playback: &'a PlaybackHandle,
    pub mpris: Option<&'a MprisHandle>,
    pub control_tx: &'a Sender<ControlCmd>,
    pub control_rx: &'a Receiver<ControlCmd>,
    pub worker_tx: &'a Sender<WorkerMsg>,
    pub worker_rx: &'a Receiver<WorkerMsg>,
}

/// Show a failed command as a toast, unless it was merely overtaken.
fn report(app: &mut App, context: &str, err: &SessionError) {
    if err.is_user_visible() {
        warn!(error = %err, "{context} failed");
        app.notify_error(format!("{context}: {err}"));
    } else {
        debug!(error = %err, "{context} superseded");
    }
}

/// Main terminal event loop: handles input, worker results, end-of-track,
/// MPRIS commands and drawing. Returns `Ok(())` when shutdown is requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ctx: &LoopContext<'_>,
    app: &mut App,
    state: &mut EventLoopState,
) -> Result<()> {
    loop {
        while let Ok(cmd) = ctx.control_rx.try_recv() {
            if handle_control_cmd(cmd, ctx.session, app) {
                return Ok(());
            }
        }

        while let Ok(msg) = ctx.worker_rx.try_recv() {
            handle_worker_msg(msg, app);
        }

        if ctx.session.tick_check_ended() {
            if let Err(e) = ctx.session.advance_after_end() {
                report(app, "auto-advance", &e);
            }
        }

        sync_app(ctx, app, state);

        if let Some(mpris) = ctx.mpris {
            update_mpris(mpris, ctx.session);
        }

        terminal.draw(|f| ui::draw(f, app, &ctx.settings.controls))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, ctx, app, state) {
                    return Ok(());
                }
            }
        }
    }
}

/// Pull committed session state into the view model.
fn sync_app(ctx: &LoopContext<'_>, app: &mut App, state: &mut EventLoopState) {
    let revision = ctx.session.revision();
    if state.last_revision != Some(revision) {
        state.last_revision = Some(revision);
        app.set_tracks(ctx.session.tracks());
        app.apply_snapshot(ctx.session.snapshot());
        request_lyrics(ctx, app, state);
    }

    // Position moves without a transition; read it straight from the engine.
    if let Some(now) = app.now.as_mut() {
        if let Ok(info) = ctx.playback.lock() {
            now.position = info.position;
            now.playing = info.playing;
            if !info.duration.is_zero() {
                now.duration = info.duration;
            }
        }
    }

    let position = app.now.as_ref().filter(|n| n.playing).map(|n| n.position);
    if let Some(position) = position {
        app.follow_lyrics(position);
    }
}

fn request_lyrics(ctx: &LoopContext<'_>, app: &mut App, state: &mut EventLoopState) {
    let Some(track) = app.now_playing().filter(|t| t.is_local()).cloned() else {
        state.lyrics_for = None;
        app.clear_lyrics();
        return;
    };
    if state.lyrics_for.as_deref() == Some(track.remote_id.as_str()) {
        return;
    }
    state.lyrics_for = Some(track.remote_id.clone());
    app.clear_lyrics();
    worker::spawn_lyrics(ctx.session.clone(), track, ctx.worker_tx.clone());
}

fn handle_worker_msg(msg: WorkerMsg, app: &mut App) {
    match msg {
        WorkerMsg::SearchDone(Ok(results)) => {
            if results.is_empty() {
                app.notify("No results");
            }
            app.set_results(results);
        }
        WorkerMsg::SearchDone(Err(e)) => {
            app.searching = false;
            report(app, "search", &e);
        }
        WorkerMsg::PlayDone { title, result } => match result {
            Ok(_) => app.notify(format!("Playing {title}")),
            Err(e) => report(app, &format!("play {title}"), &e),
        },
        WorkerMsg::LyricsLoaded { remote_id, result } => {
            let current = app.now_playing().map(|t| t.remote_id.as_str());
            if current != Some(remote_id.as_str()) {
                return;
            }
            match result {
                Ok(lyrics) => app.set_lyrics(remote_id, lyrics),
                Err(e) => debug!(id = %remote_id, error = %e, "lyrics unavailable"),
            }
        }
    }
}

/// Apply a desktop transport command. Returns true on `Quit`.
fn handle_control_cmd(cmd: ControlCmd, session: &SessionController, app: &mut App) -> bool {
    let result = match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => session.resume(),
        ControlCmd::Pause => session.pause(),
        ControlCmd::PlayPause => session.toggle_pause().map(|_| ()),
        ControlCmd::Stop => session.stop(),
        ControlCmd::Next => session.next().map(|_| ()),
        ControlCmd::Prev => session.previous().map(|_| ()),
        ControlCmd::Seek(micros) => session.seek(micros as f64 / 1_000_000.0),
        ControlCmd::SetPosition(micros) => session.seek_to(micros as f64 / 1_000_000.0),
        ControlCmd::SetVolume(level) => session.set_volume_to(level).map(|_| ()),
        ControlCmd::SetLoop(enabled) => {
            if session.loop_at_end() == enabled {
                Ok(())
            } else {
                session.toggle_loop().map(|_| ())
            }
        }
    };
    if let Err(e) = result {
        report(app, "media control", &e);
    }
    false
}

fn handle_input_key(key: KeyEvent, ctx: &LoopContext<'_>, app: &mut App) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (app.input, key.code) {
        (_, KeyCode::Esc) => {
            if app.input == InputMode::Filter {
                app.clear_filter();
            } else {
                app.exit_input_mode();
            }
        }
        (InputMode::Search, KeyCode::Enter) => {
            app.exit_input_mode();
            if app.search_query.trim().is_empty() {
                app.notify_error("Type something to search for");
                return;
            }
            app.searching = true;
            worker::spawn_search(
                ctx.session.clone(),
                app.search_query.clone(),
                app.search_filter,
                ctx.worker_tx.clone(),
            );
        }
        (InputMode::Filter, KeyCode::Enter) => app.exit_input_mode(),
        (InputMode::Search, KeyCode::Backspace) => app.pop_search_char(),
        (InputMode::Filter, KeyCode::Backspace) => app.pop_filter_char(),
        (InputMode::Filter, KeyCode::Char('j' | 'n')) if ctrl => app.next(),
        (InputMode::Filter, KeyCode::Char('k' | 'p')) if ctrl => app.prev(),
        (InputMode::Search, KeyCode::Char(c)) if !c.is_control() => app.push_search_char(c),
        (InputMode::Filter, KeyCode::Char(c)) if !c.is_control() => app.push_filter_char(c),
        _ => {}
    }
}

fn activate_selection(ctx: &LoopContext<'_>, app: &mut App) {
    match app.tab {
        Tab::Search => {
            let Some(track) = app.selected_result().cloned() else {
                return;
            };
            app.notify(format!("Fetching {}", track.title));
            worker::spawn_play_remote(
                ctx.session.clone(),
                track,
                app.progress.clone(),
                ctx.worker_tx.clone(),
            );
        }
        Tab::Playlist => {
            if !app.has_tracks() {
                return;
            }
            let already = app.now.as_ref().is_some_and(|n| {
                n.current_index == Some(app.selected) && n.state == PlaybackState::Playing
            });
            if !already {
                if let Err(e) = ctx.session.play_from_registry(app.selected) {
                    report(app, "play", &e);
                }
            }
        }
        Tab::Lyrics => {
            if let Some(at) = app.selected_lyric_time() {
                if let Err(e) = ctx.session.seek_to(at.as_secs_f64()) {
                    report(app, "seek", &e);
                }
            }
        }
    }
}

/// Handle one key press. Returns true when the user asked to quit.
fn handle_key_event(
    key: KeyEvent,
    ctx: &LoopContext<'_>,
    app: &mut App,
    state: &mut EventLoopState,
) -> bool {
    if app.input != InputMode::Normal {
        state.pending_gg = false;
        handle_input_key(key, ctx, app);
        return false;
    }

    let session = ctx.session;
    let controls = &ctx.settings.controls;
    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => app.next_tab(),
        KeyCode::Char('1') => app.set_tab(Tab::Search),
        KeyCode::Char('2') => app.set_tab(Tab::Playlist),
        KeyCode::Char('3') => app.set_tab(Tab::Lyrics),
        KeyCode::Char('/') => match app.tab {
            Tab::Playlist => app.enter_filter_mode(),
            Tab::Search | Tab::Lyrics => app.begin_search_input(),
        },
        KeyCode::Char('f') => {
            app.toggle_search_filter();
            app.notify(format!("Searching {}", app.search_filter));
        }
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.prev(),
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                app.jump(false);
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => app.jump(true),
        KeyCode::Enter => activate_selection(ctx, app),
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            let _ = ctx.control_tx.send(ControlCmd::PlayPause);
        }
        KeyCode::Char('l') => {
            let _ = ctx.control_tx.send(ControlCmd::Next);
        }
        KeyCode::Char('h') => {
            let _ = ctx.control_tx.send(ControlCmd::Prev);
        }
        KeyCode::Char('L') => {
            if let Err(e) = session.seek(controls.seek_seconds as f64) {
                report(app, "seek", &e);
            }
        }
        KeyCode::Char('H') => {
            if let Err(e) = session.seek(-(controls.seek_seconds as f64)) {
                report(app, "seek", &e);
            }
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            if let Err(e) = session.set_volume(controls.volume_step) {
                report(app, "volume", &e);
            }
        }
        KeyCode::Char('-') => {
            if let Err(e) = session.set_volume(-controls.volume_step) {
                report(app, "volume", &e);
            }
        }
        KeyCode::Char('m') => match session.toggle_mute() {
            Ok(true) => app.notify("Muted"),
            Ok(false) => app.notify("Unmuted"),
            Err(e) => report(app, "mute", &e),
        },
        KeyCode::Char('s') => match session.shuffle() {
            Ok(index) => {
                app.set_selected(index);
                app.notify("Shuffled");
            }
            Err(e) => report(app, "shuffle", &e),
        },
        KeyCode::Char('r') => match session.toggle_loop() {
            Ok(on) => app.notify(if on { "Loop: ON" } else { "Loop: OFF" }),
            Err(e) => report(app, "loop", &e),
        },
        KeyCode::Char('R') => {
            session.refresh_registry();
            app.notify(format!("{} tracks", session.tracks().len()));
        }
        KeyCode::Char('d') | KeyCode::Delete if app.tab == Tab::Playlist => {
            match session.delete_current_or(app.selected) {
                Ok(track) => app.notify(format!("Deleted {}", track.title)),
                Err(e) => report(app, "delete", &e),
            }
        }
        _ => {}
    }

    false
}
