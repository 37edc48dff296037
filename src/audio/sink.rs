//! Helpers for opening audio files and preparing `rodio` sinks.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use lofty::prelude::*;
use rodio::{Decoder, OutputStream, Sink, Source};

use super::engine::EngineError;

pub(super) fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>, EngineError> {
    let file = File::open(path).map_err(|source| EngineError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| EngineError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Total length of `path`, asking the decoder first and the tags second.
pub(super) fn probe_duration(path: &Path) -> Duration {
    open_source(path)
        .ok()
        .and_then(|d| d.total_duration())
        .or_else(|| {
            lofty::read_from_path(path)
                .ok()
                .map(|t| t.properties().duration())
        })
        .unwrap_or(Duration::ZERO)
}

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
pub(super) fn create_sink_at(
    stream: &OutputStream,
    path: &Path,
    start_at: Duration,
    volume: f32,
) -> Result<Sink, EngineError> {
    // `skip_duration` is the fallback seeking primitive; Duration::ZERO is fine.
    let source = open_source(path)?.skip_duration(start_at);

    let sink = Sink::connect_new(stream.mixer());
    sink.set_volume(volume);
    sink.append(source);
    sink.pause();
    Ok(sink)
}
