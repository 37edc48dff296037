use super::*;
use crate::library::Track;
use crate::lyrics::Lyrics;
use crate::search::SearchFilter;
use std::time::Duration;

/// A track shown as "Artist - Title", or "Ox - Title" when no artist is given.
fn t(display: &str) -> Track {
    let (artist, title) = display.split_once(" - ").unwrap_or(("Ox", display));
    Track::remote(
        title.to_lowercase(),
        title,
        vec![artist.to_string()],
        None,
        Duration::from_secs(60),
        None,
    )
}

fn app(titles: &[&str]) -> App {
    App::new(titles.iter().map(|s| t(s)).collect(), SearchFilter::Songs)
}

#[test]
fn fuzzy_match_simple() {
    let title = "Hello World";
    assert!(App::fuzzy_match_positions(title, "hw").is_some());
    assert!(App::fuzzy_match_positions(title, "ello").is_some());
    assert!(App::fuzzy_match_positions(title, "xyz").is_none());
}

#[test]
fn display_indices_respects_filter_query() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.push_filter_char('e');
    assert_eq!(app.display_indices(), vec![1]);
}

#[test]
fn display_indices_uses_fuzzy_not_substring_only() {
    let mut app = app(&["Metallica - Blackened", "Black Sabbath - Paranoid"]);
    // Letters appear in order but not contiguously.
    app.filter_query = "mtbk".into();
    assert_eq!(app.display_indices(), vec![0]);
}

#[test]
fn trimming_filter_query_affects_matching() {
    let mut app = app(&["Black Sabbath - Paranoid"]);
    app.filter_query = "Black ".into();
    assert_eq!(app.display_indices(), vec![0]);

    app.filter_query = "   ".into();
    assert_eq!(app.display_indices(), vec![0]);
}

#[test]
fn large_playlists_use_precomputed_lowercase_titles() {
    let titles: Vec<String> = (0..150).map(|i| format!("Song {i}")).collect();
    let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    let mut app = app(&refs);
    assert!(app.uses_lower_titles());

    app.filter_query = "SONG 149".into();
    assert_eq!(app.display_indices(), vec![149]);
    assert!(app.fuzzy_match_positions_for_track_lower(149, "s149").is_some());
}

#[test]
fn next_prev_in_view_helpers_work() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.filter_query = "et".into(); // only Beta is visible

    assert_eq!(app.next_in_view_from(0), Some(1));
    assert_eq!(app.prev_in_view_from(0), Some(1));
    assert_eq!(app.next_in_view_from(1), Some(1));
    assert_eq!(app.prev_in_view_from(1), Some(1));
}

#[test]
fn filter_keeps_cursor_on_a_visible_entry() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.set_selected(2);
    app.enter_filter_mode();
    assert_eq!(app.input, InputMode::Filter);
    assert_eq!(app.tab, Tab::Playlist);

    app.push_filter_char('b');
    assert_eq!(app.selected, 1);
    app.clear_filter();
    assert_eq!(app.input, InputMode::Normal);
    assert_eq!(app.display_indices(), vec![0, 1, 2]);
}

#[test]
fn set_tracks_clamps_selection() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.set_selected(2);
    app.set_tracks(vec![t("Alpha")]);
    assert_eq!(app.selected, 0);
    app.set_tracks(Vec::new());
    assert_eq!(app.selected, 0);
    assert!(!app.has_tracks());
}

#[test]
fn tabs_cycle_and_reset_input() {
    let mut app = app(&[]);
    assert_eq!(app.tab, Tab::Search);
    app.begin_search_input();
    assert_eq!(app.input, InputMode::Search);

    app.next_tab();
    assert_eq!(app.tab, Tab::Playlist);
    assert_eq!(app.input, InputMode::Normal);
    app.next_tab();
    app.next_tab();
    assert_eq!(app.tab, Tab::Search);
}

#[test]
fn search_cursor_wraps_over_results() {
    let mut app = app(&[]);
    app.set_results(vec![t("A"), t("B"), t("C")]);
    app.prev();
    assert_eq!(app.selected_result().map(|r| r.title.as_str()), Some("C"));
    app.next();
    assert_eq!(app.result_selected, 0);
}

#[test]
fn jump_targets_the_active_tab() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.set_tab(Tab::Playlist);
    app.filter_query = "a".into();
    app.jump(true);
    assert_eq!(app.selected, 2);
    app.jump(false);
    assert_eq!(app.selected, 0);

    app.set_tab(Tab::Search);
    app.set_results(vec![t("A"), t("B")]);
    app.jump(true);
    assert_eq!(app.result_selected, 1);
    assert_eq!(app.selected, 0);
}

#[test]
fn search_query_editing_and_filter_toggle() {
    let mut app = app(&[]);
    for c in "lofi".chars() {
        app.push_search_char(c);
    }
    app.pop_search_char();
    assert_eq!(app.search_query, "lof");

    app.toggle_search_filter();
    assert_eq!(app.search_filter, SearchFilter::Videos);
}

#[test]
fn lyrics_follow_position_and_expose_seek_target() {
    let mut app = app(&[]);
    app.set_tab(Tab::Lyrics);
    app.set_lyrics(
        "abc".into(),
        Lyrics::parse("[00:01.00]one\n[00:05.00]two\n[00:09.00]three"),
    );
    assert_eq!(app.lyrics.as_ref().map(|l| l.remote_id.as_str()), Some("abc"));

    app.follow_lyrics(Duration::from_secs(6));
    assert_eq!(app.lyric_selected, 1);

    app.next();
    app.next();
    assert_eq!(app.lyric_selected, 2);
    assert_eq!(app.selected_lyric_time(), Some(Duration::from_secs(9)));

    app.clear_lyrics();
    assert_eq!(app.selected_lyric_time(), None);
}

#[test]
fn plain_lyrics_have_no_seek_target() {
    let mut app = app(&[]);
    app.set_lyrics("abc".into(), Lyrics::parse("just words"));
    assert_eq!(app.selected_lyric_time(), None);
}

#[test]
fn toasts_are_replaced_by_newer_ones() {
    let mut app = app(&[]);
    assert!(app.toast().is_none());
    app.notify("downloading");
    app.notify_error("download failed");
    let toast = app.toast().unwrap();
    assert_eq!(toast.text, "download failed");
    assert!(toast.error);
}

#[test]
fn progress_ratio_handles_unknown_total() {
    let mut p = DownloadProgress {
        title: "x".into(),
        done: 5,
        total: 0,
    };
    assert_eq!(p.ratio(), 0.0);
    p.total = 10;
    assert_eq!(p.ratio(), 0.5);
}
