use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub at: Duration,
    pub text: String,
}

/// Parsed lyrics, sorted by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lyrics {
    lines: Vec<LyricLine>,
    synced: bool,
}

fn parse_stamp(inner: &str) -> Option<Duration> {
    let (min, sec) = inner.split_once(':')?;
    let min: u64 = min.trim().parse().ok()?;
    let sec: f64 = sec.trim().parse().ok()?;
    if !(0.0..60.0).contains(&sec) {
        return None;
    }
    let whole = Duration::from_secs(min.checked_mul(60)?);
    whole.checked_add(Duration::try_from_secs_f64(sec).ok()?)
}

impl Lyrics {
    /// Parse LRC text. Plain text without stamps is kept, untimed, at zero.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut synced = false;

        for raw in text.lines() {
            let mut rest = raw.trim();
            let mut stamps = Vec::new();
            while let Some(after) = rest.strip_prefix('[') {
                let Some((inner, tail)) = after.split_once(']') else {
                    break;
                };
                match parse_stamp(inner) {
                    Some(at) => {
                        stamps.push(at);
                        rest = tail;
                    }
                    None => break,
                }
            }

            if stamps.is_empty() {
                // [ar:...], [ti:...] and friends.
                let is_tag = rest.starts_with('[') && rest.ends_with(']') && rest.contains(':');
                if is_tag || rest.is_empty() {
                    continue;
                }
                lines.push(LyricLine {
                    at: Duration::ZERO,
                    text: rest.to_string(),
                });
            } else {
                synced = true;
                let text = rest.trim().to_string();
                lines.extend(stamps.into_iter().map(|at| LyricLine {
                    at,
                    text: text.clone(),
                }));
            }
        }

        lines.sort_by_key(|l| l.at);
        Self { lines, synced }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the last line at or before `position`; `None` for unsynced text.
    pub fn current_line(&self, position: Duration) -> Option<usize> {
        if !self.synced {
            return None;
        }
        self.lines
            .partition_point(|l| l.at <= position)
            .checked_sub(1)
    }
}
