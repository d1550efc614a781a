//! Notifications from the engine to the UI layer.

use chrono::{DateTime, Utc};
use std::fmt;
use tasktree_types::AppDocument;
use tokio::sync::mpsc;

/// Receiving end of the engine's event channel.
pub type SyncEvents = mpsc::UnboundedReceiver<SyncEvent>;

/// Something the UI layer must react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A newer remote document was pulled; replace local state with it.
    DocumentReplaced(AppDocument),
    /// The session was torn down; show the login flow with this reason.
    SessionInvalidated(InvalidationReason),
    /// A remote document download started (`true`) or finished (`false`).
    LoadingChanged(bool),
    /// The local document was written; the remote now carries `modified`.
    Pushed { modified: DateTime<Utc> },
}

/// Why a session was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The remote rejected the token.
    AuthRejected(String),
    /// The remote file disappeared after having been seen.
    RemoteMissing,
    /// Writes kept failing past the configured limit.
    WriteFailed(String),
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::AuthRejected(detail) => write!(
                f,
                "Logged out: the session has expired, please log in again ({detail})"
            ),
            InvalidationReason::RemoteMissing => write!(
                f,
                "Logged out: the remote document was removed, please log in again"
            ),
            InvalidationReason::WriteFailed(detail) => write!(
                f,
                "Logged out: saving kept failing, please log in again ({detail})"
            ),
        }
    }
}
