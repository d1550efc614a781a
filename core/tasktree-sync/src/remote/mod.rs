//! Remote document storage.
//!
//! The engine talks to the remote through [`RemoteStore`], which covers the
//! three collaborators it needs: locating the well-known file by name,
//! reading its metadata and content, and writing it.

pub mod google_drive;
pub mod memory;

pub use google_drive::{GoogleDriveConfig, GoogleDriveStore};
pub use memory::{MemoryRemote, RemoteOp};

use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about the remote document file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// The provider's identifier for the file.
    pub id: String,
    /// Last modification time reported by the provider, when it was returned.
    pub modified_time: Option<DateTime<Utc>>,
}

/// Abstract remote storage for the single document file.
///
/// Every call carries the bearer token explicitly; implementations hold no
/// credentials of their own. Implementations map 401/403 responses to
/// [`SyncError::Auth`](crate::SyncError::Auth) and everything else that fails
/// to [`SyncError::Transport`](crate::SyncError::Transport).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of the storage provider.
    fn provider_name(&self) -> &'static str;

    /// Finds the file named `file_name`.
    ///
    /// When several files share the name, the first one the provider
    /// returns is used.
    async fn locate(&self, token: &str, file_name: &str) -> SyncResult<Option<RemoteFile>>;

    /// Reads the last-modified timestamp of a file.
    async fn read_metadata(&self, token: &str, file_id: &str) -> SyncResult<DateTime<Utc>>;

    /// Downloads a file's content.
    async fn read_content(&self, token: &str, file_id: &str) -> SyncResult<Vec<u8>>;

    /// Creates the file (`file_id` is `None`) or overwrites it in place.
    ///
    /// Returns the file's identifier and its new modification time.
    async fn write(
        &self,
        token: &str,
        file_id: Option<&str>,
        file_name: &str,
        payload: &[u8],
    ) -> SyncResult<(String, DateTime<Utc>)>;
}
