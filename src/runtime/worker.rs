//! Background jobs that must not block the UI loop. Each reports back with
//! a `WorkerMsg` on the loop's channel.

use std::fs;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use tracing::debug;

use crate::app::{DownloadProgress, ProgressHandle};
use crate::library::Track;
use crate::lyrics::Lyrics;
use crate::search::SearchFilter;
use crate::session::{SessionController, SessionError};

pub enum WorkerMsg {
    SearchDone(Result<Vec<Track>, SessionError>),
    PlayDone {
        title: String,
        result: Result<usize, SessionError>,
    },
    LyricsLoaded {
        remote_id: String,
        result: Result<Lyrics, String>,
    },
}

pub fn spawn_search(
    session: Arc<SessionController>,
    query: String,
    filter: SearchFilter,
    tx: Sender<WorkerMsg>,
) {
    thread::spawn(move || {
        let result = session.search(&query, filter);
        let _ = tx.send(WorkerMsg::SearchDone(result));
    });
}

/// Download (if needed) and play `track`, publishing progress as it goes.
pub fn spawn_play_remote(
    session: Arc<SessionController>,
    track: Track,
    progress: ProgressHandle,
    tx: Sender<WorkerMsg>,
) {
    thread::spawn(move || {
        if let Ok(mut p) = progress.lock() {
            *p = Some(DownloadProgress {
                title: track.title.clone(),
                done: 0,
                total: 0,
            });
        }

        let report = |done: u64, total: u64| {
            if let Ok(mut p) = progress.lock() {
                if let Some(p) = p.as_mut() {
                    p.done = done;
                    p.total = total;
                }
            }
        };
        let result = session.play_remote(&track.remote_id, &report);

        if let Ok(mut p) = progress.lock() {
            // A newer download may have taken over the slot.
            if p.as_ref().is_some_and(|p| p.title == track.title) {
                *p = None;
            }
        }
        let _ = tx.send(WorkerMsg::PlayDone {
            title: track.title,
            result,
        });
    });
}

/// Read the lyrics of a local track, fetching them first when missing.
pub fn spawn_lyrics(session: Arc<SessionController>, track: Track, tx: Sender<WorkerMsg>) {
    thread::spawn(move || {
        let downloads = session.downloads();
        let result = downloads
            .fetch_lyrics(&track)
            .map_err(|e| e.to_string())
            .and_then(|path| fs::read_to_string(&path).map_err(|e| e.to_string()))
            .map(|text| Lyrics::parse(&text));
        if let Err(e) = &result {
            debug!(id = %track.remote_id, error = %e, "no lyrics");
        }
        let _ = tx.send(WorkerMsg::LyricsLoaded {
            remote_id: track.remote_id,
            result,
        });
    });
}
