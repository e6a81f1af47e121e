//! confsync command-line backup runner.
//!
//! Runs one backup cycle and exits: 0 on a successful sync or when nothing
//! changed, 1 on configuration, pull, or push failure. An external scheduler
//! (cron, a systemd timer) provides cadence and must keep invocations from
//! overlapping — the working copy is not locked.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use confsync_core::sync_engine::{SyncEngine, SyncOutcome};
use confsync_core::AppConfig;

/// Mirror configured directories into a git-backed backup repository.
#[derive(Parser, Debug)]
#[command(name = "confsync", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // try_parse instead of parse: a missing config argument must exit 1,
    // not clap's default 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(&cli).await {
        Ok(SyncOutcome::NoChanges) => {
            info!("no changes detected");
            ExitCode::SUCCESS
        }
        Ok(SyncOutcome::Synced { commit, files }) => {
            info!(%commit, files, "backup synchronized");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "backup run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<SyncOutcome> {
    let config = AppConfig::load_and_resolve(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let engine = SyncEngine::new(config).context("failed to initialize notifier")?;
    engine.run().await.context("sync run failed")
}
