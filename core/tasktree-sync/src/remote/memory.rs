//! In-memory remote store.
//!
//! Behaves like a single-folder file host: files are addressed by id, looked
//! up by name in creation order, and stamped with a modification time on
//! every write. Timestamps follow tokio's clock, so tests running with paused
//! time get deterministic values. Failures and latency can be injected per
//! operation.

use super::{RemoteFile, RemoteStore};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Remote operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Locate,
    ReadMetadata,
    ReadContent,
    Write,
}

#[derive(Debug, Clone)]
struct StoredFile {
    id: String,
    name: String,
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
struct MemoryState {
    files: Vec<StoredFile>,
    next_id: u64,
    last_modified: Option<DateTime<Utc>>,
    failures: VecDeque<(RemoteOp, SyncError)>,
    calls: HashMap<RemoteOp, usize>,
}

/// A [`RemoteStore`] backed by process memory.
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    accepted_token: Option<String>,
    latency: Duration,
    base: DateTime<Utc>,
    started: Instant,
}

impl MemoryRemote {
    /// Creates an empty store that accepts any token.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                files: Vec::new(),
                next_id: 1,
                last_modified: None,
                failures: VecDeque::new(),
                calls: HashMap::new(),
            }),
            accepted_token: None,
            latency: Duration::ZERO,
            base: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            started: Instant::now(),
        }
    }

    /// Rejects every token except `token` with an auth error.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.accepted_token = Some(token.into());
        self
    }

    /// Delays every call by `latency` before it touches the store.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The store's current clock: a fixed base plus elapsed tokio time.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = ChronoDuration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| ChronoDuration::zero());
        self.base + elapsed
    }

    /// Creates or overwrites `name` as another session would.
    pub fn put(&self, name: &str, content: impl Into<Vec<u8>>) -> RemoteFile {
        let modified = self.now();
        self.put_at(name, content, modified)
    }

    /// Like [`put`](Self::put) with an explicit modification time.
    pub fn put_at(
        &self,
        name: &str,
        content: impl Into<Vec<u8>>,
        modified: DateTime<Utc>,
    ) -> RemoteFile {
        let mut state = self.lock();
        let existing = state.files.iter().position(|f| f.name == name);
        let id = match existing {
            Some(index) => {
                let file = &mut state.files[index];
                file.content = content.into();
                file.modified = modified;
                file.id.clone()
            }
            None => {
                let id = format!("mem-{}", state.next_id);
                state.next_id += 1;
                state.files.push(StoredFile {
                    id: id.clone(),
                    name: name.to_string(),
                    content: content.into(),
                    modified,
                });
                id
            }
        };
        let latest = state.last_modified.map_or(modified, |last| last.max(modified));
        state.last_modified = Some(latest);
        RemoteFile {
            id,
            modified_time: Some(modified),
        }
    }

    /// Deletes every file called `name`.
    pub fn remove(&self, name: &str) {
        self.lock().files.retain(|f| f.name != name);
    }

    /// Returns the content of the first file called `name`.
    pub fn content(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.content.clone())
    }

    /// Returns metadata of the first file called `name`.
    pub fn file(&self, name: &str) -> Option<RemoteFile> {
        self.lock().files.iter().find(|f| f.name == name).map(|f| RemoteFile {
            id: f.id.clone(),
            modified_time: Some(f.modified),
        })
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    /// Makes the next call of `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: RemoteOp, error: SyncError) {
        self.lock().failures.push_back((op, error));
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: RemoteOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Common prologue: latency, call counting, token check, injected failure.
    async fn enter(&self, op: RemoteOp, token: &str) -> SyncResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;

        if let Some(accepted) = &self.accepted_token {
            if accepted != token {
                return Err(SyncError::Auth("token rejected".to_string()));
            }
        }

        if let Some(index) = state.failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, error)) = state.failures.remove(index) {
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn locate(&self, token: &str, file_name: &str) -> SyncResult<Option<RemoteFile>> {
        self.enter(RemoteOp::Locate, token).await?;
        Ok(self.file(file_name))
    }

    async fn read_metadata(&self, token: &str, file_id: &str) -> SyncResult<DateTime<Utc>> {
        self.enter(RemoteOp::ReadMetadata, token).await?;
        self.lock()
            .files
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.modified)
            .ok_or_else(|| SyncError::Transport(format!("file {file_id} not found")))
    }

    async fn read_content(&self, token: &str, file_id: &str) -> SyncResult<Vec<u8>> {
        self.enter(RemoteOp::ReadContent, token).await?;
        self.lock()
            .files
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.content.clone())
            .ok_or_else(|| SyncError::Transport(format!("file {file_id} not found")))
    }

    async fn write(
        &self,
        token: &str,
        file_id: Option<&str>,
        file_name: &str,
        payload: &[u8],
    ) -> SyncResult<(String, DateTime<Utc>)> {
        self.enter(RemoteOp::Write, token).await?;

        let now = self.now();
        let mut state = self.lock();
        // Versions written back to back still get distinct timestamps.
        let modified = match state.last_modified {
            Some(last) if last >= now => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        state.last_modified = Some(modified);

        match file_id {
            Some(id) => {
                let file = state
                    .files
                    .iter_mut()
                    .find(|f| f.id == id)
                    .ok_or_else(|| SyncError::Transport(format!("file {id} not found")))?;
                file.content = payload.to_vec();
                file.modified = modified;
                Ok((id.to_string(), modified))
            }
            None => {
                let id = format!("mem-{}", state.next_id);
                state.next_id += 1;
                state.files.push(StoredFile {
                    id: id.clone(),
                    name: file_name.to_string(),
                    content: payload.to_vec(),
                    modified,
                });
                Ok((id, modified))
            }
        }
    }
}
