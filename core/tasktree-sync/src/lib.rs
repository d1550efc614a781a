//! Sync engine for TaskTree.
//!
//! Mirrors a single [`AppDocument`](tasktree_types::AppDocument) to a single
//! JSON file on a file-hosting service. There is no server-side coordination:
//! the engine polls for newer remote versions and pushes local edits after a
//! quiet period, with last-writer-wins at document granularity.
//!
//! # Architecture
//!
//! - **Remote**: [`RemoteStore`] locates, reads and writes the file.
//!   [`GoogleDriveStore`] talks to Drive v3; [`MemoryRemote`] keeps files in
//!   process.
//! - **Engine**: [`SyncEngine`] runs the poll-read and debounced-write cycles
//!   for one [`Session`] at a time and reports through [`SyncEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasktree_sync::{GoogleDriveConfig, GoogleDriveStore, Session, SyncConfig, SyncEngine};
//! use tasktree_types::AppDocument;
//!
//! # async fn run() -> tasktree_sync::SyncResult<()> {
//! let remote = Arc::new(GoogleDriveStore::new(GoogleDriveConfig::default())?);
//! let (mut engine, mut events) = SyncEngine::new(remote, SyncConfig::default());
//!
//! engine.notify_mutated(AppDocument::sample()).await;
//! engine.start(Session::logged_in("ya29.token")).await;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod engine;
mod error;
pub mod event;
pub mod remote;
mod session;

pub use config::{SyncConfig, WriteFailurePolicy, DEFAULT_FILE_NAME};
pub use engine::{EnginePhase, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use event::{InvalidationReason, SyncEvent, SyncEvents};
pub use remote::{GoogleDriveConfig, GoogleDriveStore, MemoryRemote, RemoteFile, RemoteOp, RemoteStore};
pub use session::Session;
