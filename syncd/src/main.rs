//! TaskTree sync daemon
//!
//! Mirrors a local JSON document to `TaskTree.json` on Google Drive:
//! 1. Edits to the local file are pushed after the debounce window
//! 2. Newer remote versions are pulled and written back to the file
//!
//! Usage:
//!   TASKTREE_ACCESS_TOKEN=ya29... tasktree-syncd --document tasks.json
//!
//! The access token is obtained elsewhere; the daemon exits when the remote
//! rejects it.

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tasktree_sync::{GoogleDriveConfig, GoogleDriveStore, Session, SyncEngine};
use tasktree_syncd::{mirror, resolve_config, ConfigOverrides, DocumentFile};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tasktree-syncd")]
#[command(about = "Mirror a local TaskTree document to Google Drive")]
struct Args {
    /// Local document file (created from the starter document if missing)
    #[arg(short, long, default_value = "TaskTree.json")]
    document: PathBuf,

    /// OAuth access token for Google Drive
    #[arg(long, env = "TASKTREE_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    /// Name of the remote file
    #[arg(long)]
    file_name: Option<String>,

    /// Base URL of the Drive API
    #[arg(long, default_value = "https://www.googleapis.com")]
    api_base_url: String,

    /// JSON file with engine settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote poll period in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Quiet period before a local edit is pushed, in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// How often the local file is checked for edits, in milliseconds
    #[arg(long, default_value = "500")]
    watch_interval_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!("TaskTree sync daemon starting...");

    let config = resolve_config(
        args.config.as_deref(),
        &ConfigOverrides {
            file_name: args.file_name.clone(),
            poll_interval_ms: args.poll_interval_ms,
            debounce_ms: args.debounce_ms,
        },
    )?;
    let mut file = DocumentFile::open(&args.document)?;

    let remote = GoogleDriveStore::new(GoogleDriveConfig {
        api_base_url: args.api_base_url.clone(),
        ..Default::default()
    })
    .context("Failed to build Drive client")?;

    info!(
        "Mirroring {:?} to {} (poll {:?}, debounce {:?})",
        file.path(),
        config.file_name,
        config.poll_interval(),
        config.debounce_window()
    );

    let (mut engine, mut events) = SyncEngine::new(Arc::new(remote), config);
    engine.notify_mutated(file.document().clone()).await;
    engine.start(Session::logged_in(args.token.clone())).await;

    mirror(
        &mut engine,
        &mut events,
        &mut file,
        Duration::from_millis(args.watch_interval_ms),
        tokio::signal::ctrl_c(),
    )
    .await
}
