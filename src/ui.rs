//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Padding, Paragraph, Tabs, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, InputMode, Tab};
use crate::config::ControlsSettings;
use crate::library::format_time;
use crate::session::{PlaybackState, SessionSnapshot};

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert("tab/1-3", "switch tab");
    map.insert("j/k", "up/down");
    map.insert("enter", "play");
    map.insert("space/p", "play/pause");
    map.insert("h/l", "prev/next song");
    // H/L is filled dynamically from config.
    map.insert("+/-", "volume");
    map.insert("m", "mute");
    map.insert("/", "search/filter");
    map.insert("f", "songs/videos");
    map.insert("s", "shuffle");
    map.insert("r", "loop");
    map.insert("R", "rescan");
    map.insert("d", "delete");
    map.insert("q", "quit");
    map
});

/// Render the controls help text, incorporating seek seconds.
fn controls_text(seek_seconds: u64) -> String {
    let order = [
        "tab/1-3", "j/k", "enter", "space/p", "h/l", "H/L", "+/-", "m", "/", "f", "s", "r", "R",
        "d", "q",
    ];
    order
        .iter()
        .filter_map(|k| {
            if *k == "H/L" {
                Some(format!("[H/L] seek -/+{}s", seek_seconds))
            } else {
                CONTROLS_MAP.get(k).map(|v| format!("[{}] {}", k, v))
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// "elapsed / total" for the gauge label.
fn time_label(position: Duration, duration: Duration) -> String {
    if duration.is_zero() {
        format_time(position)
    } else {
        format!("{} / {}", format_time(position), format_time(duration))
    }
}

fn status_line(now: &SessionSnapshot) -> String {
    let mut parts: Vec<String> = vec![now.state.label().to_string()];
    if now.muted {
        parts.push("Vol: muted".to_string());
    } else {
        parts.push(format!("Vol: {:.0}%", now.volume * 100.0));
    }
    parts.push(if now.loop_at_end { "Loop: ON" } else { "Loop: OFF" }.to_string());
    if let Some(i) = now.current_index {
        parts.push(format!("{}/{}", i + 1, now.track_count));
    }
    parts.join(" • ")
}

/// Uppercase the characters of `title` at `positions` so matches stand out.
fn highlight(title: &str, positions: Vec<usize>) -> String {
    let mut rendered = String::with_capacity(title.len());
    let mut pos_iter = positions.into_iter();
    let mut next_pos = pos_iter.next();

    for (ci, ch) in title.chars().enumerate() {
        if next_pos == Some(ci) {
            rendered.extend(ch.to_uppercase());
            next_pos = pos_iter.next();
        } else {
            rendered.push(ch);
        }
    }
    rendered
}

/// First and last visible rows so the selected row stays centered.
fn visible_window(total: usize, height: usize, selected: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected);
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

fn render_list(frame: &mut Frame, area: Rect, title: String, items: Vec<ListItem>, selected: Option<usize>) {
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(selected);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_search(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let editing = app.input == InputMode::Search;
    let mut query = app.search_query.clone();
    if editing {
        query.push('_');
    }
    let input = Paragraph::new(query).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" search ({}) ", app.search_filter))
            .border_style(if editing {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            }),
    );
    frame.render_widget(input, chunks[0]);

    let title = if app.searching {
        " results (searching…) ".to_string()
    } else {
        format!(" results ({}) ", app.results.len())
    };
    let height = chunks[1].height.saturating_sub(2) as usize;
    let (start, end, sel) = visible_window(app.results.len(), height, app.result_selected);
    let items = app.results[start..end]
        .iter()
        .map(|t| {
            ListItem::new(Line::from(vec![
                Span::raw(t.display()),
                Span::raw("  "),
                Span::styled(format_time(t.duration), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let selected = (!app.results.is_empty()).then_some(sel);
    render_list(frame, chunks[1], title, items, selected);
}

fn draw_playlist(frame: &mut Frame, app: &App, area: Rect) {
    let display = app.display_indices();
    let q = app.filter_query.trim();
    let query_lower = (!q.is_empty() && app.uses_lower_titles()).then(|| q.to_ascii_lowercase());
    let playing = app.now.as_ref().and_then(|s| s.current_index);

    let height = area.height.saturating_sub(2) as usize;
    let sel_pos = display.iter().position(|&i| i == app.selected).unwrap_or(0);
    let (start, end, sel) = visible_window(display.len(), height, sel_pos);

    // Only build items for the visible window.
    let items = display[start..end]
        .iter()
        .map(|&i| {
            let title = app.tracks[i].display();
            let positions = if q.is_empty() {
                None
            } else {
                match query_lower.as_deref() {
                    Some(ql) => app.fuzzy_match_positions_for_track_lower(i, ql),
                    None => App::fuzzy_match_positions(&title, q),
                }
            };
            let text = match positions {
                Some(p) => highlight(&title, p),
                None => title,
            };
            if playing == Some(i) {
                ListItem::new(format!("♪ {text}")).style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("  {text}"))
            }
        })
        .collect();

    let mut title = format!(" playlist ({}) ", app.tracks.len());
    if app.input == InputMode::Filter || !q.is_empty() {
        title = format!(" playlist • filter: {}{} ", q, if app.input == InputMode::Filter { "_" } else { "" });
    }
    let selected = (!display.is_empty()).then_some(sel);
    render_list(frame, area, title, items, selected);
}

fn draw_lyrics(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" lyrics ");
    let Some(loaded) = app.lyrics.as_ref().filter(|l| !l.lyrics.is_empty()) else {
        let msg = if app.now_playing().is_some() {
            "No lyrics for this track."
        } else {
            "Nothing playing."
        };
        frame.render_widget(
            Paragraph::new(msg).alignment(Alignment::Center).block(block),
            area,
        );
        return;
    };

    let lines = loaded.lyrics.lines();
    let height = area.height.saturating_sub(2) as usize;
    let (start, end, sel) = visible_window(lines.len(), height, app.lyric_selected);
    let items = lines[start..end]
        .iter()
        .map(|l| ListItem::new(l.text.as_str()))
        .collect();
    render_list(frame, area, " lyrics ".to_string(), items, Some(sel));
}

fn draw_now_playing(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::bordered()
        .padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        })
        .title(" now playing ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let Some(now) = app.now.as_ref() else {
        return;
    };
    let song = match &now.current {
        Some(t) => format!("{} • {}", t.display(), t.album),
        None => "Nothing selected".to_string(),
    };
    let song = Paragraph::new(song).bold().wrap(Wrap { trim: true });
    frame.render_widget(song, rows[0]);
    frame.render_widget(Paragraph::new(status_line(now)), rows[1]);

    let progress = app.progress.lock().ok().and_then(|p| p.clone());
    let gauge = match progress {
        Some(p) => Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(p.ratio())
            .label(format!("downloading {} {:.0}%", p.title, p.ratio() * 100.0)),
        None => {
            let ratio = if now.duration.is_zero() || now.state == PlaybackState::Empty {
                0.0
            } else {
                (now.position.as_secs_f64() / now.duration.as_secs_f64()).clamp(0.0, 1.0)
            };
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Green))
                .ratio(ratio)
                .label(time_label(now.position, now.duration))
        }
    };
    frame.render_widget(gauge, rows[2]);
}

/// Render the entire UI into the provided `frame`.
pub fn draw(frame: &mut Frame, app: &App, controls: &ControlsSettings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let tabs = Tabs::new(
        Tab::ALL
            .iter()
            .map(|t| format!("{} {}", t.index() + 1, t.title())),
    )
    .select(app.tab.index())
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" musicterm ")
            .title_alignment(Alignment::Center),
    );
    frame.render_widget(tabs, chunks[0]);

    draw_now_playing(frame, app, chunks[1]);

    match app.tab {
        Tab::Search => draw_search(frame, app, chunks[2]),
        Tab::Playlist => draw_playlist(frame, app, chunks[2]),
        Tab::Lyrics => draw_lyrics(frame, app, chunks[2]),
    }

    if let Some(toast) = app.toast() {
        let style = if toast.error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Yellow)
        };
        frame.render_widget(Paragraph::new(toast.text.as_str()).style(style), chunks[3]);
    }

    let footer = Paragraph::new(controls_text(controls.seek_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);
}
