use std::time::Duration;

use super::piped::parse_response;
use super::*;

#[test]
fn filter_parses_known_names_only() {
    assert_eq!("songs".parse::<SearchFilter>().unwrap(), SearchFilter::Songs);
    assert_eq!(" Videos ".parse::<SearchFilter>().unwrap(), SearchFilter::Videos);
    assert!(matches!(
        "albums".parse::<SearchFilter>(),
        Err(SearchError::Validation(_))
    ));
}

#[test]
fn filter_toggle_flips() {
    assert_eq!(SearchFilter::Songs.toggle(), SearchFilter::Videos);
    assert_eq!(SearchFilter::Videos.toggle(), SearchFilter::Songs);
}

#[test]
fn blank_query_is_rejected() {
    assert!(matches!(validate_query("   "), Err(SearchError::Validation(_))));
    assert_eq!(validate_query("  daft punk ").unwrap(), "daft punk");
}

#[test]
fn parse_response_keeps_streams_in_order() {
    let body = r#"{
        "items": [
            {"type": "stream", "url": "/watch?v=aaa", "title": "One More Time",
             "thumbnail": "https://img/aaa.jpg", "uploaderName": "Daft Punk - Topic",
             "duration": 320},
            {"type": "channel", "url": "/channel/zzz", "name": "Daft Punk"},
            {"type": "stream", "url": "/watch?v=bbb", "title": "Untitled",
             "duration": -1}
        ],
        "nextpage": null
    }"#;

    let tracks = parse_response(body).unwrap();
    assert_eq!(tracks.len(), 2);

    assert_eq!(tracks[0].remote_id, "aaa");
    assert_eq!(tracks[0].title, "One More Time");
    assert_eq!(tracks[0].artists, vec!["Daft Punk".to_string()]);
    assert_eq!(tracks[0].duration, Duration::from_secs(320));
    assert_eq!(tracks[0].thumbnail_url(), Some("https://img/aaa.jpg"));
    assert!(!tracks[0].is_local());

    assert_eq!(tracks[1].remote_id, "bbb");
    assert_eq!(tracks[1].artists, vec!["Unknown Artist".to_string()]);
    assert_eq!(tracks[1].duration, Duration::ZERO);
}

#[test]
fn parse_response_rejects_garbage() {
    assert!(matches!(parse_response("<html>"), Err(SearchError::Parse(_))));
}

#[test]
fn missing_items_is_an_empty_result() {
    assert!(parse_response("{}").unwrap().is_empty());
}
