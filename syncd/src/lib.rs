//! Local-file side of the TaskTree sync daemon.
//!
//! The daemon stands in for the UI: the document lives in a JSON file on disk,
//! edits to that file are fed to the engine, and documents pulled from the
//! remote are written back to it.

use anyhow::{bail, Context, Result};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tasktree_sync::{SyncConfig, SyncEngine, SyncEvent, SyncEvents};
use tasktree_types::{parse_document, AppDocument};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// The local document file and what the daemon last knew of it.
#[derive(Debug)]
pub struct DocumentFile {
    path: PathBuf,
    modified: Option<SystemTime>,
    current: AppDocument,
}

impl DocumentFile {
    /// Opens `path`, creating it from the starter document if it does not
    /// exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = if path.exists() {
            info!("Loading document from {:?}", path);
            read_document(&path)?
        } else {
            info!("Creating starter document at {:?}", path);
            let document = AppDocument::sample();
            write_atomic(&path, &document)?;
            document
        };

        Ok(Self {
            modified: modified_time(&path)?,
            path,
            current,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document as last read from or written to disk.
    pub fn document(&self) -> &AppDocument {
        &self.current
    }

    /// Returns the new document if the file changed on disk since it was last
    /// seen and now holds something different.
    ///
    /// An unparseable or invalid file is an error; the previous document is
    /// kept and the same modification is not reported again.
    pub fn poll_change(&mut self) -> Result<Option<AppDocument>> {
        let modified = modified_time(&self.path)?;
        if modified == self.modified {
            return Ok(None);
        }
        self.modified = modified;

        let document = read_document(&self.path)?;
        if document == self.current {
            debug!("{:?} touched without content change", self.path);
            return Ok(None);
        }
        self.current = document.clone();
        Ok(Some(document))
    }

    /// Overwrites the file with `document`.
    pub fn replace(&mut self, document: &AppDocument) -> Result<()> {
        write_atomic(&self.path, document)?;
        self.modified = modified_time(&self.path)?;
        self.current = document.clone();
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<AppDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_document(&bytes).with_context(|| format!("Invalid document in {}", path.display()))
}

fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    let metadata =
        fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(metadata.modified().ok())
}

/// Writes `document` next to `path` and renames it into place, so readers
/// never see a partial file.
pub fn write_atomic(path: &Path, document: &AppDocument) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let bytes = serde_json::to_vec_pretty(document).context("Failed to encode document")?;
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub file_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
}

/// Builds the engine configuration from an optional JSON file plus overrides.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => SyncConfig::default(),
    };

    if let Some(file_name) = &overrides.file_name {
        config.file_name = file_name.clone();
    }
    if let Some(ms) = overrides.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(ms) = overrides.debounce_ms {
        config.debounce_ms = ms;
    }
    Ok(config)
}

/// Runs the engine against `file` until `shutdown` resolves or the session
/// ends.
///
/// The engine is stopped on every way out, errors included.
pub async fn mirror<F>(
    engine: &mut SyncEngine,
    events: &mut SyncEvents,
    file: &mut DocumentFile,
    watch_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let result = run_mirror(engine, events, file, watch_interval, shutdown).await;
    engine.stop().await;
    result
}

async fn run_mirror<F>(
    engine: &SyncEngine,
    events: &mut SyncEvents,
    file: &mut DocumentFile,
    watch_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut watch = tokio::time::interval(watch_interval.max(Duration::from_millis(1)));
    watch.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for shutdown")?;
                info!("Shutting down");
                return Ok(());
            }
            _ = watch.tick() => match file.poll_change() {
                Ok(Some(document)) => {
                    debug!("Local edit detected ({} nodes)", document.node_count());
                    engine.notify_mutated(document).await;
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring local file: {:#}", e),
            },
            event = events.recv() => match event {
                Some(SyncEvent::DocumentReplaced(document)) => {
                    file.replace(&document)
                        .context("Failed to write pulled document to the local file")?;
                    info!("Local file updated from remote");
                }
                Some(SyncEvent::Pushed { modified }) => {
                    info!("Remote updated at {}", modified);
                }
                Some(SyncEvent::LoadingChanged(loading)) => {
                    debug!("Loading: {}", loading);
                }
                Some(SyncEvent::SessionInvalidated(reason)) => {
                    error!("{}", reason);
                    bail!("sync stopped: {reason}");
                }
                None => bail!("sync engine went away"),
            },
        }
    }
}
