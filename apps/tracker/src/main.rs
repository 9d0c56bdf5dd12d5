//! killtrack entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "killtrack")]
#[command(about = "Tails Game.log and reports kills and deaths")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/killtrack/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Game.log to monitor, overriding the configured path
    #[arg(long)]
    log: Option<PathBuf>,

    /// Activate a new reporting key before starting
    #[arg(long)]
    key: Option<String>,

    /// Player handle, skipping detection from the log
    #[arg(long)]
    handle: Option<String>,

    /// Character GEID, skipping detection from the log
    #[arg(long)]
    geid: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting killtrack");

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::info!(log = %config.log_path.display(), "configuration loaded");

    let overrides = app::Overrides {
        log_path: cli.log,
        key: cli.key,
        handle: cli.handle,
        geid: cli.geid,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, overrides))?;

    tracing::info!("killtrack shut down cleanly");
    Ok(())
}
