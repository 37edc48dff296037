use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Send logs to a daily rolling file under `log_dir`.
///
/// The terminal belongs to the UI, so nothing is written to stderr. `dev`
/// raises the default level to debug; `RUST_LOG` overrides both. Keep the
/// returned guard alive until exit or buffered lines are lost.
pub fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "musicterm.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default = if dev { "info,musicterm=debug" } else { "warn,musicterm=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;
    Ok(guard)
}
