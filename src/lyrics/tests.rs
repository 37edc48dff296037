use std::time::Duration;

use super::lrclib::pick_lyrics;
use super::*;

const SAMPLE: &str = "\
[ar:Someone]
[ti:Song]
[00:12.00]First line
[00:05.50]Intro line
[00:20.00][01:02.25]Chorus
[00:30.00]
";

#[test]
fn parse_sorts_lines_and_skips_tags() {
    let lyrics = Lyrics::parse(SAMPLE);
    assert!(lyrics.is_synced());
    let texts: Vec<&str> = lyrics.lines().iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["Intro line", "First line", "Chorus", "", "Chorus"]);
    assert_eq!(lyrics.lines()[0].at, Duration::from_millis(5_500));
    assert_eq!(lyrics.lines()[4].at, Duration::from_millis(62_250));
}

#[test]
fn current_line_tracks_position() {
    let lyrics = Lyrics::parse(SAMPLE);
    assert_eq!(lyrics.current_line(Duration::from_secs(1)), None);
    assert_eq!(lyrics.current_line(Duration::from_millis(5_500)), Some(0));
    assert_eq!(lyrics.current_line(Duration::from_secs(15)), Some(1));
    assert_eq!(lyrics.current_line(Duration::from_secs(600)), Some(4));
}

#[test]
fn plain_text_is_kept_untimed() {
    let lyrics = Lyrics::parse("line one\n\nline two\n");
    assert!(!lyrics.is_synced());
    assert_eq!(lyrics.lines().len(), 2);
    assert_eq!(lyrics.current_line(Duration::from_secs(3)), None);
}

#[test]
fn empty_input_gives_empty_lyrics() {
    assert!(Lyrics::parse("").is_empty());
}

#[test]
fn malformed_stamp_is_treated_as_text() {
    let lyrics = Lyrics::parse("[xx:yy] hello");
    assert!(!lyrics.is_synced());
    assert_eq!(lyrics.lines()[0].text, "[xx:yy] hello");
}

#[test]
fn out_of_range_minutes_are_treated_as_text() {
    let text = "[99999999999999999999:00.00]too far\n[307445734561827861:00.00]overflow\n[00:01.00]ok";
    let lyrics = Lyrics::parse(text);
    let texts: Vec<&str> = lyrics.lines().iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "[99999999999999999999:00.00]too far",
            "[307445734561827861:00.00]overflow",
            "ok"
        ]
    );
}

#[test]
fn pick_lyrics_prefers_synced() {
    let body = r#"{"syncedLyrics": "[00:01.00]a", "plainLyrics": "a"}"#;
    assert_eq!(pick_lyrics(body).unwrap().as_deref(), Some("[00:01.00]a"));

    let body = r#"{"syncedLyrics": null, "plainLyrics": "just text"}"#;
    assert_eq!(pick_lyrics(body).unwrap().as_deref(), Some("just text"));

    let body = r#"{"syncedLyrics": "  ", "plainLyrics": null, "instrumental": true}"#;
    assert_eq!(pick_lyrics(body).unwrap(), None);
}
