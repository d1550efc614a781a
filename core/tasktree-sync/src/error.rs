//! Error types for the sync layer.

use tasktree_types::ValidationError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote rejected the bearer token (401/403). Terminal for the session.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Network failure or a non-auth error status from the remote.
    #[error("transport error: {0}")]
    Transport(String),

    /// A remote call did not complete within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document failed the validity contract.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The session this worker served was stopped or restarted while it was
    /// between remote calls.
    #[error("sync session superseded")]
    Superseded,
}

impl SyncError {
    /// Returns true if the session must be torn down.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for SyncError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SyncError::Timeout
    }
}
