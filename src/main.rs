//! CLI entry point for the hfsync client.

use anyhow::{Context, Result};
use clap::Parser;
use hfsync_core::{Settings, SyncLoop, derive_credential};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if args.key {
        let credential = derive_credential().context("failed to derive host credential")?;
        println!("{credential}");
        return Ok(());
    }

    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))?;

    info!("hfsync starting");
    info!(folder = %settings.download_folder.display(), "destination folder");
    if !settings.ignore_prefixes.is_empty() {
        info!(ignored = ?settings.ignore_prefixes, "ignoring paths with prefixes");
    }

    let sync = SyncLoop::from_settings(settings).context("failed to start sync")?;
    sync.run().await.context("sync stopped")?;

    info!("hfsync finished");
    Ok(())
}
