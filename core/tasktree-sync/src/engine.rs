//! Sync engine: keeps one local document and one remote file in step.
//!
//! Two activities run while a session is active:
//!
//! - **Poll-read**: every `poll_interval`, locate the remote file, read its
//!   modification time and pull it if it is ahead of the watermark by more
//!   than the staleness margin.
//! - **Debounced write**: every mutation re-arms a quiet-period timer; when it
//!   expires the local document is validated and written.
//!
//! Both run on a single worker task per session, so they never overlap. The
//! state they share with the handle lives behind one mutex, and every result
//! that arrives after a network call is applied only if the worker's
//! generation is still current. A worker whose generation has moved on makes
//! no further remote calls once the one in flight returns.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::event::{InvalidationReason, SyncEvent, SyncEvents};
use crate::remote::RemoteStore;
use crate::session::Session;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tasktree_types::{check_document, parse_document, AppDocument, Watermark};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Whether synchronization is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No session, or the session was torn down. Both timers are disarmed.
    Suspended,
    /// Poll-read and debounced write are armed.
    Active,
}

/// State shared between the handle and the worker.
#[derive(Debug)]
struct SharedState {
    /// Bumped on every start, stop and invalidation.
    generation: u64,
    phase: EnginePhase,
    session: Session,
    watermark: Watermark,
    document: AppDocument,
    /// Skip the next debounced write: the local document was just pulled.
    suspended_from_external_load: bool,
    /// The remote file has been seen during this session.
    remote_seen: bool,
    write_failures: u32,
}

impl SharedState {
    fn new() -> Self {
        Self {
            generation: 0,
            phase: EnginePhase::Suspended,
            session: Session::logged_out(),
            watermark: Watermark::epoch(),
            document: AppDocument::empty(),
            suspended_from_external_load: false,
            remote_seen: false,
            write_failures: 0,
        }
    }

    fn reset_for_session(&mut self, session: Session) {
        self.phase = EnginePhase::Active;
        self.session = session;
        self.watermark = Watermark::epoch();
        self.suspended_from_external_load = false;
        self.remote_seen = false;
        self.write_failures = 0;
    }
}

enum Command {
    Mutated,
}

struct WorkerHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Synchronizes one [`AppDocument`] with one remote file.
///
/// Construct once, then [`start`](Self::start) per session. Results are
/// delivered on the [`SyncEvents`] channel returned by [`new`](Self::new).
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    config: Arc<SyncConfig>,
    state: Arc<Mutex<SharedState>>,
    events: mpsc::UnboundedSender<SyncEvent>,
    worker: Option<WorkerHandle>,
}

impl SyncEngine {
    /// Creates a suspended engine and the channel its events arrive on.
    pub fn new(remote: Arc<dyn RemoteStore>, config: SyncConfig) -> (Self, SyncEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Self {
            remote,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(SharedState::new())),
            events,
            worker: None,
        };
        (engine, receiver)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Starts synchronizing for `session`.
    ///
    /// A session without a token or not logged in leaves the engine
    /// suspended. Calling this while active restarts with a fresh watermark.
    pub async fn start(&mut self, session: Session) {
        self.stop().await;

        let mut state = self.state.lock().await;
        if !session.is_active() {
            debug!("Session not active, sync stays suspended");
            return;
        }

        state.generation += 1;
        state.reset_for_session(session);
        let generation = state.generation;
        drop(state);

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            remote: Arc::clone(&self.remote),
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            generation,
        };
        let task = tokio::spawn(worker.run(receiver));
        self.worker = Some(WorkerHandle { commands, task });

        info!(
            "Sync started against {} (generation {})",
            self.remote.provider_name(),
            generation
        );
    }

    /// Stops synchronizing and forgets the session.
    ///
    /// A network call already in flight is allowed to finish, but its result
    /// is discarded.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Dropping the sender ends the worker loop at its next wake-up.
        drop(worker.commands);

        let mut state = self.state.lock().await;
        if state.phase == EnginePhase::Active {
            state.generation += 1;
            state.phase = EnginePhase::Suspended;
            state.session.clear();
            info!("Sync stopped");
        }
    }

    /// Records a local edit and re-arms the debounced write.
    pub async fn notify_mutated(&self, document: AppDocument) {
        let mut state = self.state.lock().await;
        state.document = document;
        if state.phase != EnginePhase::Active {
            return;
        }
        if let Some(worker) = &self.worker {
            let _ = worker.commands.send(Command::Mutated);
        }
    }

    /// Returns whether synchronization is running.
    pub async fn phase(&self) -> EnginePhase {
        self.state.lock().await.phase
    }

    /// Returns the current watermark.
    pub async fn watermark(&self) -> Watermark {
        self.state.lock().await.watermark
    }

    /// Returns the engine's copy of the local document.
    pub async fn document(&self) -> AppDocument {
        self.state.lock().await.document.clone()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// What a poll found on the remote.
enum PullOutcome {
    Absent,
    UpToDate,
    Rejected,
    Pulled {
        document: AppDocument,
        modified: DateTime<Utc>,
    },
}

/// Runs both cycles for one session.
struct Worker {
    remote: Arc<dyn RemoteStore>,
    config: Arc<SyncConfig>,
    state: Arc<Mutex<SharedState>>,
    events: mpsc::UnboundedSender<SyncEvent>,
    generation: u64,
}

impl Worker {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let period = self.config.poll_interval().max(Duration::from_millis(1));
        let mut poll = tokio::time::interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut debounce: Option<Instant> = None;

        loop {
            let deadline = debounce.unwrap_or_else(Instant::now);
            let flow = tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Mutated) => {
                        debounce = Some(Instant::now() + self.config.debounce_window());
                        Flow::Continue
                    }
                    None => Flow::Halt,
                },
                _ = poll.tick() => self.poll_cycle(&mut debounce).await,
                _ = tokio::time::sleep_until(deadline), if debounce.is_some() => {
                    debounce = None;
                    self.write_cycle(&mut debounce).await
                }
            };
            if flow == Flow::Halt {
                break;
            }
        }

        debug!("Sync worker {} exited", self.generation);
    }

    // ── Poll-read cycle ──────────────────────────────────────────

    async fn poll_cycle(&self, debounce: &mut Option<Instant>) -> Flow {
        let (token, watermark) = {
            let Some(state) = self.lock_current().await else {
                return Flow::Halt;
            };
            let Some(token) = state.session.token() else {
                return Flow::Halt;
            };
            (token.to_string(), state.watermark)
        };

        match self.pull(&token, watermark).await {
            Ok(outcome) => self.apply_pull(outcome, debounce).await,
            Err(SyncError::Superseded) => Flow::Halt,
            Err(e) if e.is_auth() => {
                self.invalidate(InvalidationReason::AuthRejected(e.to_string()))
                    .await
            }
            Err(e @ SyncError::Validation(_)) => {
                warn!("Remote document rejected, keeping local state: {}", e);
                self.apply_pull(PullOutcome::Rejected, debounce).await
            }
            Err(e) if e.is_transient() => {
                warn!("Poll failed, retrying next tick: {}", e);
                Flow::Continue
            }
            Err(e) => {
                warn!("Poll failed: {}", e);
                Flow::Continue
            }
        }
    }

    async fn pull(&self, token: &str, watermark: Watermark) -> SyncResult<PullOutcome> {
        let file_name = &self.config.file_name;
        let Some(file) = self.call(self.remote.locate(token, file_name)).await? else {
            return Ok(PullOutcome::Absent);
        };
        self.ensure_current().await?;

        let modified = self.call(self.remote.read_metadata(token, &file.id)).await?;
        if !watermark.is_stale(modified, self.config.staleness_margin()) {
            debug!("Remote {} at {} is not ahead of {}", file_name, modified, watermark);
            return Ok(PullOutcome::UpToDate);
        }
        self.ensure_current().await?;

        self.emit(SyncEvent::LoadingChanged(true));
        let content = self.call(self.remote.read_content(token, &file.id)).await;
        // Closes the indicator opened above, even if the session ended meanwhile.
        self.emit(SyncEvent::LoadingChanged(false));

        let document = parse_document(&content?)?;
        Ok(PullOutcome::Pulled { document, modified })
    }

    async fn apply_pull(&self, outcome: PullOutcome, debounce: &mut Option<Instant>) -> Flow {
        let Some(mut state) = self.lock_current().await else {
            return Flow::Halt;
        };

        match outcome {
            PullOutcome::Absent if state.remote_seen => {
                return self.invalidate_locked(&mut state, InvalidationReason::RemoteMissing);
            }
            PullOutcome::Absent => {
                debug!("No remote {} yet, local document is authoritative", self.config.file_name);
                if self.config.seed_when_absent && state.document.is_valid() && debounce.is_none() {
                    *debounce = Some(Instant::now() + self.config.debounce_window());
                }
            }
            PullOutcome::UpToDate | PullOutcome::Rejected => {
                state.remote_seen = true;
            }
            PullOutcome::Pulled { document, modified } => {
                info!(
                    "Pulled remote document modified at {} ({} nodes)",
                    modified,
                    document.node_count()
                );
                state.document = document.clone();
                state.watermark.advance_to(modified);
                state.suspended_from_external_load = true;
                state.remote_seen = true;
                // A replacement counts as a mutation for the debounce timer.
                *debounce = Some(Instant::now() + self.config.debounce_window());
                self.emit(SyncEvent::DocumentReplaced(document));
            }
        }
        Flow::Continue
    }

    // ── Debounced write cycle ────────────────────────────────────

    async fn write_cycle(&self, debounce: &mut Option<Instant>) -> Flow {
        let (token, payload) = {
            let Some(mut state) = self.lock_current().await else {
                return Flow::Halt;
            };

            if state.suspended_from_external_load {
                state.suspended_from_external_load = false;
                debug!("Skipping write of the document just pulled");
                return Flow::Continue;
            }

            let payload = match encode(&state.document) {
                Ok(payload) => payload,
                Err(e @ SyncError::Validation(_)) => {
                    debug!("Local document not written: {}", e);
                    return Flow::Continue;
                }
                Err(e) => {
                    warn!("Failed to encode local document: {}", e);
                    return Flow::Continue;
                }
            };

            let Some(token) = state.session.token() else {
                return Flow::Halt;
            };
            (token.to_string(), payload)
        };

        let result = self.push(&token, &payload).await;

        let Some(mut state) = self.lock_current().await else {
            return Flow::Halt;
        };
        match result {
            Ok((file_id, modified)) => {
                info!("Wrote {} bytes to {} at {}", payload.len(), file_id, modified);
                state.watermark.advance_to(modified);
                state.remote_seen = true;
                state.write_failures = 0;
                self.emit(SyncEvent::Pushed { modified });
                Flow::Continue
            }
            Err(e) if e.is_auth() => self.invalidate_locked(
                &mut state,
                InvalidationReason::AuthRejected(e.to_string()),
            ),
            Err(e) if e.is_transient() => {
                state.write_failures += 1;
                let failures = state.write_failures;
                match self
                    .config
                    .write_failure
                    .backoff(failures, self.config.poll_interval())
                {
                    Some(delay) => {
                        warn!(
                            "Write failed ({} in a row), retrying in {:?}: {}",
                            failures, delay, e
                        );
                        if debounce.is_none() {
                            *debounce = Some(Instant::now() + delay);
                        }
                        Flow::Continue
                    }
                    None => self.invalidate_locked(
                        &mut state,
                        InvalidationReason::WriteFailed(e.to_string()),
                    ),
                }
            }
            Err(e) => {
                self.invalidate_locked(&mut state, InvalidationReason::WriteFailed(e.to_string()))
            }
        }
    }

    async fn push(&self, token: &str, payload: &[u8]) -> SyncResult<(String, DateTime<Utc>)> {
        let file_name = &self.config.file_name;
        let file = self.call(self.remote.locate(token, file_name)).await?;
        self.ensure_current().await?;
        let file_id = file.as_ref().map(|f| f.id.as_str());
        self.call(self.remote.write(token, file_id, file_name, payload))
            .await
    }

    // ── Helpers ──────────────────────────────────────────────────

    /// Bounds a remote call by the request timeout.
    async fn call<T>(&self, request: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        tokio::time::timeout(self.config.request_timeout(), request).await?
    }

    /// Locks the shared state if this worker's generation is still current.
    async fn lock_current(&self) -> Option<MutexGuard<'_, SharedState>> {
        let state = self.state.lock().await;
        if state.generation != self.generation {
            debug!("Discarding result of stale sync worker {}", self.generation);
            return None;
        }
        Some(state)
    }

    /// Fails with [`SyncError::Superseded`] once this worker's session is over.
    async fn ensure_current(&self) -> SyncResult<()> {
        match self.lock_current().await {
            Some(_) => Ok(()),
            None => Err(SyncError::Superseded),
        }
    }

    async fn invalidate(&self, reason: InvalidationReason) -> Flow {
        match self.lock_current().await {
            Some(mut state) => self.invalidate_locked(&mut state, reason),
            None => Flow::Halt,
        }
    }

    /// Tears the session down: clears credentials, the local document and
    /// the watermark, then tells the UI.
    fn invalidate_locked(&self, state: &mut SharedState, reason: InvalidationReason) -> Flow {
        warn!("Session invalidated: {}", reason);
        state.generation += 1;
        state.phase = EnginePhase::Suspended;
        state.session.clear();
        state.document = AppDocument::empty();
        state.watermark = Watermark::epoch();
        state.suspended_from_external_load = false;
        state.remote_seen = false;
        state.write_failures = 0;
        self.emit(SyncEvent::SessionInvalidated(reason));
        Flow::Halt
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

/// Serializes the local document for upload, enforcing the validity contract.
fn encode(document: &AppDocument) -> SyncResult<Vec<u8>> {
    let value = serde_json::to_value(document)?;
    check_document(&value)?;
    Ok(serde_json::to_vec(&value)?)
}
