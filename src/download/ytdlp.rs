use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::DownloadSettings;
use crate::library::Track;

use super::{CancelToken, DownloadError, Fetcher, ProgressFn};

const POLL: Duration = Duration::from_millis(100);
const PROGRESS_TAG: &str = "musicterm:";

/// Runs the `yt-dlp` binary: best audio, converted to the configured format.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
    watch_url: String,
    format: String,
    quality: String,
}

impl YtDlpFetcher {
    pub fn new(settings: &DownloadSettings) -> Self {
        Self {
            program: settings.ytdlp_path.clone(),
            watch_url: settings.watch_url.clone(),
            format: settings.audio_format.clone(),
            quality: settings.audio_quality.clone(),
        }
    }

    fn args(&self, track: &Track, staging: &Path) -> Vec<String> {
        let template = staging.join(format!("{}.%(ext)s", track.remote_id));
        vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--quiet".into(),
            "--progress".into(),
            "--progress-template".into(),
            format!(
                "download:{PROGRESS_TAG}%(progress.downloaded_bytes)s/%(progress.total_bytes,progress.total_bytes_estimate)s"
            ),
            "-f".into(),
            "bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.format.clone(),
            "--audio-quality".into(),
            self.quality.clone(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            format!("{}{}", self.watch_url, track.remote_id),
        ]
    }
}

/// `musicterm:1024/4096` -> `(1024, 4096)`. Estimates may come as floats.
pub(super) fn parse_progress(line: &str) -> Option<(u64, u64)> {
    let rest = line.trim().strip_prefix(PROGRESS_TAG)?;
    let (done, total) = rest.split_once('/')?;
    let done: f64 = done.trim().parse().ok()?;
    let total: f64 = total.trim().parse().ok()?;
    if !done.is_finite() || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some((done.max(0.0) as u64, total as u64))
}

/// The file yt-dlp left in `staging` for `id`, whatever its extension.
fn find_output(staging: &Path, id: &str, preferred_ext: &str) -> Option<PathBuf> {
    let preferred = staging.join(format!("{id}.{preferred_ext}"));
    if preferred.is_file() {
        return Some(preferred);
    }
    std::fs::read_dir(staging)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && p.file_stem().and_then(|s| s.to_str()) == Some(id)
                && p.extension().and_then(|s| s.to_str()) != Some("part")
        })
}

impl Fetcher for YtDlpFetcher {
    fn fetch(
        &self,
        track: &Track,
        staging: &Path,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError> {
        info!(id = %track.remote_id, title = %track.title, "downloading");

        let mut child = Command::new(&self.program)
            .args(self.args(track, staging))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DownloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel::<(u64, u64)>();
        let stdout_reader = child.stdout.take().map(|out| {
            thread::spawn(move || {
                for line in BufReader::new(out).lines().map_while(Result::ok) {
                    if let Some(p) = parse_progress(&line) {
                        if tx.send(p).is_err() {
                            break;
                        }
                    }
                }
            })
        });
        let stderr_reader = child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = err.read_to_string(&mut text);
                text
            })
        });

        let mut last_logged = 0u64;
        let mut report = |(done, total): (u64, u64)| {
            progress(done, total);
            let percent = done.saturating_mul(100) / total.max(1);
            if percent >= last_logged + 10 {
                last_logged = percent - percent % 10;
                debug!(id = %track.remote_id, percent, "download progress");
            }
        };

        let status = loop {
            while let Ok(p) = rx.try_recv() {
                report(p);
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                info!(id = %track.remote_id, "download cancelled");
                return Err(DownloadError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL),
                Err(e) => return Err(DownloadError::io(staging, e)),
            }
        };

        if let Some(h) = stdout_reader {
            let _ = h.join();
        }
        while let Ok(p) = rx.try_recv() {
            report(p);
        }
        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let detail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(DownloadError::Fetcher {
                status: status.to_string(),
                detail,
            });
        }

        find_output(staging, &track.remote_id, &self.format)
            .ok_or_else(|| DownloadError::NoOutput(track.remote_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_progress_reads_tagged_lines_only() {
        assert_eq!(parse_progress("musicterm:1024/4096"), Some((1024, 4096)));
        assert_eq!(parse_progress("  musicterm:10/20.5 "), Some((10, 20)));
        assert_eq!(parse_progress("musicterm:NA/NA"), None);
        assert_eq!(parse_progress("musicterm:5/0"), None);
        assert_eq!(parse_progress("[download] 10%"), None);
    }

    #[test]
    fn args_put_output_in_staging_and_url_last() {
        let fetcher = YtDlpFetcher::new(&DownloadSettings::default());
        let track = Track::remote("abc", "t", vec![], None, Duration::ZERO, None);
        let args = fetcher.args(&track, Path::new("/music/.partial"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://music.youtube.com/watch?v=abc")
        );
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/music/.partial/abc.%(ext)s");
        assert!(args.windows(2).any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
    }

    #[test]
    fn find_output_prefers_configured_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.webm.part"), b"x").unwrap();
        assert_eq!(find_output(dir.path(), "abc", "mp3"), None);
        std::fs::write(dir.path().join("abc.opus"), b"x").unwrap();
        assert_eq!(
            find_output(dir.path(), "abc", "mp3"),
            Some(dir.path().join("abc.opus"))
        );
        std::fs::write(dir.path().join("abc.mp3"), b"x").unwrap();
        assert_eq!(
            find_output(dir.path(), "abc", "mp3"),
            Some(dir.path().join("abc.mp3"))
        );
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let settings = DownloadSettings {
            ytdlp_path: "/nonexistent/yt-dlp-missing".to_string(),
            ..DownloadSettings::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let track = Track::remote("abc", "t", vec![], None, Duration::ZERO, None);
        let res = YtDlpFetcher::new(&settings).fetch(
            &track,
            dir.path(),
            &CancelToken::new(),
            &|_, _| {},
        );
        assert!(matches!(res, Err(DownloadError::Spawn { .. })));
    }
}
