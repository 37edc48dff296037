//! Application model types: `App`, `Tab`, `InputMode` and the download
//! progress shared with worker threads.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::library::Track;
use crate::lyrics::Lyrics;
use crate::search::SearchFilter;
use crate::session::SessionSnapshot;

/// How long a toast stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Search,
    Playlist,
    Lyrics,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Search, Tab::Playlist, Tab::Lyrics];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Search => "Search",
            Tab::Playlist => "Playlist",
            Tab::Lyrics => "Lyrics",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tab::Search => 0,
            Tab::Playlist => 1,
            Tab::Lyrics => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

/// Where typed characters go.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Editing the search query.
    Search,
    /// Editing the playlist filter.
    Filter,
}

/// Progress of the running download, fed by the pipeline callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadProgress {
    pub title: String,
    pub done: u64,
    pub total: u64,
}

impl DownloadProgress {
    /// Completed fraction in `0.0..=1.0`; zero while the total is unknown.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.done as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

pub type ProgressHandle = Arc<Mutex<Option<DownloadProgress>>>;

#[derive(Clone, Debug)]
pub struct Toast {
    pub text: String,
    pub error: bool,
    shown_at: Instant,
}

/// Lyrics loaded for one track.
#[derive(Clone, Debug)]
pub struct LoadedLyrics {
    pub remote_id: String,
    pub lyrics: Lyrics,
}

/// The main application model.
pub struct App {
    pub tab: Tab,
    pub input: InputMode,

    /// Mirror of the registry, in registry order.
    pub tracks: Vec<Track>,
    pub selected: usize,
    lower_titles: Option<Vec<String>>,
    pub filter_query: String,

    pub search_query: String,
    pub search_filter: SearchFilter,
    pub results: Vec<Track>,
    pub result_selected: usize,
    pub searching: bool,

    /// Last committed session state.
    pub now: Option<SessionSnapshot>,
    pub lyrics: Option<LoadedLyrics>,
    pub lyric_selected: usize,

    pub progress: ProgressHandle,
    toast: Option<Toast>,
}

impl App {
    /// Create a new `App` showing `tracks` in the playlist tab.
    pub fn new(tracks: Vec<Track>, search_filter: SearchFilter) -> Self {
        let mut app = Self {
            tab: Tab::default(),
            input: InputMode::Normal,
            tracks: Vec::new(),
            selected: 0,
            lower_titles: None,
            filter_query: String::new(),
            search_query: String::new(),
            search_filter,
            results: Vec::new(),
            result_selected: 0,
            searching: false,
            now: None,
            lyrics: None,
            lyric_selected: 0,
            progress: Arc::new(Mutex::new(None)),
            toast: None,
        };
        app.set_tracks(tracks);
        app
    }

    /// Replace the playlist, keeping the cursor in range.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        // Precompute lowercase titles for larger libraries so filtering on
        // every keystroke does not lowercase each title again.
        self.lower_titles = if tracks.len() > 100 {
            Some(
                tracks
                    .iter()
                    .map(|t| t.display().to_ascii_lowercase())
                    .collect(),
            )
        } else {
            None
        };
        self.tracks = tracks;
        if self.selected >= self.tracks.len() {
            self.selected = self.tracks.len().saturating_sub(1);
        }
        self.ensure_selected_visible();
    }

    /// Take in a new session snapshot. Returns true when the playing track changed.
    pub fn apply_snapshot(&mut self, snapshot: SessionSnapshot) -> bool {
        let before = self.now_playing().map(|t| t.remote_id.clone());
        let after = snapshot.current.as_ref().map(|t| t.remote_id.clone());
        self.now = Some(snapshot);
        before != after
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.now.as_ref().and_then(|s| s.current.as_ref())
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.input = InputMode::Normal;
    }

    pub fn next_tab(&mut self) {
        self.set_tab(self.tab.next());
    }

    // ---- toasts

    pub fn notify(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            error: true,
            shown_at: Instant::now(),
        });
    }

    /// The current toast, if it has not expired yet.
    pub fn toast(&self) -> Option<&Toast> {
        self.toast
            .as_ref()
            .filter(|t| t.shown_at.elapsed() < TOAST_TTL)
    }

    // ---- search tab

    pub fn begin_search_input(&mut self) {
        self.set_tab(Tab::Search);
        self.input = InputMode::Search;
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search_query.push(c);
    }

    pub fn pop_search_char(&mut self) {
        self.search_query.pop();
    }

    pub fn toggle_search_filter(&mut self) {
        self.search_filter = self.search_filter.toggle();
    }

    pub fn set_results(&mut self, results: Vec<Track>) {
        self.results = results;
        self.result_selected = 0;
        self.searching = false;
    }

    pub fn selected_result(&self) -> Option<&Track> {
        self.results.get(self.result_selected)
    }

    // ---- lyrics tab

    pub fn set_lyrics(&mut self, remote_id: String, lyrics: Lyrics) {
        self.lyrics = Some(LoadedLyrics { remote_id, lyrics });
        self.lyric_selected = 0;
    }

    pub fn clear_lyrics(&mut self) {
        self.lyrics = None;
        self.lyric_selected = 0;
    }

    /// Move the lyric cursor to the line being sung at `position`.
    pub fn follow_lyrics(&mut self, position: Duration) {
        if let Some(i) = self
            .lyrics
            .as_ref()
            .and_then(|l| l.lyrics.current_line(position))
        {
            self.lyric_selected = i;
        }
    }

    /// Start time of the selected lyric line, for seeking.
    pub fn selected_lyric_time(&self) -> Option<Duration> {
        let loaded = self.lyrics.as_ref()?;
        if !loaded.lyrics.is_synced() {
            return None;
        }
        loaded
            .lyrics
            .lines()
            .get(self.lyric_selected)
            .map(|l| l.at)
    }

    // ---- playlist tab

    /// Playlist indices that pass the active filter, in registry order.
    pub fn display_indices(&self) -> Vec<usize> {
        let base = 0..self.tracks.len();
        let query = self.filter_query.trim();
        if query.is_empty() {
            return base.collect();
        }
        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                let query_lower = query.to_ascii_lowercase();
                base.filter(|&i| {
                    Self::fuzzy_match_positions_lower(&lower_titles[i], &query_lower).is_some()
                })
                .collect()
            }
            None => base
                .filter(|&i| Self::fuzzy_match_positions(&self.tracks[i].display(), query).is_some())
                .collect(),
        }
    }

    /// Return true if this `App` uses precomputed lowercase titles.
    pub fn uses_lower_titles(&self) -> bool {
        self.lower_titles.is_some()
    }

    /// Fuzzy-match `query_lower` against a specific track by index.
    pub fn fuzzy_match_positions_for_track_lower(
        &self,
        track_index: usize,
        query_lower: &str,
    ) -> Option<Vec<usize>> {
        if query_lower.is_empty() {
            return Some(Vec::new());
        }

        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                Self::fuzzy_match_positions_lower(&lower_titles[track_index], query_lower)
            }
            None => Self::fuzzy_match_positions(&self.tracks[track_index].display(), query_lower),
        }
    }

    /// Next visible index after `current`, wrapping to the first.
    pub fn next_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        let pos = display.iter().position(|&i| i == current);
        match pos {
            Some(p) => Some(display[(p + 1) % display.len()]),
            None => Some(display[0]),
        }
    }

    /// Previous visible index before `current`, wrapping to the last.
    pub fn prev_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        let pos = display.iter().position(|&i| i == current);
        match pos {
            Some(0) => Some(display[display.len() - 1]),
            Some(p) => Some(display[p - 1]),
            None => Some(display[display.len() - 1]),
        }
    }

    pub fn set_selected(&mut self, idx: usize) {
        self.selected = idx;
        self.ensure_selected_visible();
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Fuzzy/subsequence match: the character positions in `title` that
    /// match `query`, or `None` if not matched.
    pub fn fuzzy_match_positions(title: &str, query: &str) -> Option<Vec<usize>> {
        if query.is_empty() {
            return Some(Vec::new());
        }

        let mut positions: Vec<usize> = Vec::new();
        let mut title_iter = title.chars().enumerate();

        for qc in query.chars() {
            let qc_low = qc.to_ascii_lowercase();
            loop {
                match title_iter.next() {
                    Some((ti, tc)) if tc.to_ascii_lowercase() == qc_low => {
                        positions.push(ti);
                        break;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }

        Some(positions)
    }

    fn fuzzy_match_positions_lower(title_lower: &str, query_lower: &str) -> Option<Vec<usize>> {
        if query_lower.is_empty() {
            return Some(Vec::new());
        }

        let mut positions: Vec<usize> = Vec::new();
        let mut title_iter = title_lower.chars().enumerate();

        for qc in query_lower.chars() {
            loop {
                match title_iter.next() {
                    Some((ti, tc)) if tc == qc => {
                        positions.push(ti);
                        break;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }

        Some(positions)
    }

    pub fn enter_filter_mode(&mut self) {
        self.set_tab(Tab::Playlist);
        self.input = InputMode::Filter;
        self.ensure_selected_visible();
    }

    pub fn exit_input_mode(&mut self) {
        self.input = InputMode::Normal;
    }

    pub fn clear_filter(&mut self) {
        self.filter_query.clear();
        self.input = InputMode::Normal;
        self.ensure_selected_visible();
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter_query.push(c);
        self.ensure_selected_visible();
    }

    pub fn pop_filter_char(&mut self) {
        self.filter_query.pop();
        self.ensure_selected_visible();
    }

    /// Keep `selected` inside the filtered view, else jump to its first entry.
    fn ensure_selected_visible(&mut self) {
        let display = self.display_indices();
        if display.is_empty() {
            self.selected = 0;
            return;
        }

        if !display.contains(&self.selected) {
            self.selected = display[0];
        }
    }

    /// Move the cursor of the active tab down.
    pub fn next(&mut self) {
        match self.tab {
            Tab::Playlist => {
                if let Some(next) = self.next_in_view_from(self.selected) {
                    self.selected = next;
                }
            }
            Tab::Search => {
                if !self.results.is_empty() {
                    self.result_selected = (self.result_selected + 1) % self.results.len();
                }
            }
            Tab::Lyrics => {
                let len = self.lyrics.as_ref().map_or(0, |l| l.lyrics.lines().len());
                if len > 0 {
                    self.lyric_selected = (self.lyric_selected + 1).min(len - 1);
                }
            }
        }
    }

    /// Jump the cursor of the active tab to its first (`gg`) or last (`G`) entry.
    pub fn jump(&mut self, to_end: bool) {
        match self.tab {
            Tab::Playlist => {
                let display = self.display_indices();
                let target = if to_end { display.last() } else { display.first() };
                if let Some(&i) = target {
                    self.selected = i;
                }
            }
            Tab::Search => {
                self.result_selected = if to_end {
                    self.results.len().saturating_sub(1)
                } else {
                    0
                };
            }
            Tab::Lyrics => {
                let len = self.lyrics.as_ref().map_or(0, |l| l.lyrics.lines().len());
                self.lyric_selected = if to_end { len.saturating_sub(1) } else { 0 };
            }
        }
    }

    /// Move the cursor of the active tab up.
    pub fn prev(&mut self) {
        match self.tab {
            Tab::Playlist => {
                if let Some(prev) = self.prev_in_view_from(self.selected) {
                    self.selected = prev;
                }
            }
            Tab::Search => {
                let len = self.results.len();
                if len > 0 {
                    self.result_selected = (self.result_selected + len - 1) % len;
                }
            }
            Tab::Lyrics => {
                self.lyric_selected = self.lyric_selected.saturating_sub(1);
            }
        }
    }
}
