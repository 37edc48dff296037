use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

mod app;
mod audio;
mod config;
mod download;
mod library;
mod logging;
mod lyrics;
mod mpris;
mod notify;
mod platform;
mod runtime;
mod search;
mod session;
mod ui;

use config::SettingsStore;

#[derive(Parser)]
#[command(name = "musicterm")]
#[command(about = "Search, download and play music from the terminal")]
struct Cli {
    /// Settings file (default: $MUSICTERM_CONFIG_PATH or ~/.config/musicterm/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Play and store music in this directory instead of the configured one
    #[arg(long, value_name = "DIR")]
    music_dir: Option<PathBuf>,

    /// Search filter to start with: songs or videos
    #[arg(long, value_name = "KIND")]
    filter: Option<search::SearchFilter>,

    /// Enable debug logging
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut store = SettingsStore::open(cli.config.or_else(config::resolve_config_path));

    let _log_guard = logging::init_logging(&store.settings().paths.log_dir, cli.dev)?;
    info!(version = env!("CARGO_PKG_VERSION"), config = ?store.path(), "musicterm starting");
    if let Some(notice) = store.take_notice() {
        warn!("{notice}");
    }

    runtime::run(
        store,
        runtime::Overrides {
            music_dir: cli.music_dir,
            filter: cli.filter,
        },
    )
}
