//! Last-reconciled remote timestamp.
//!
//! The watermark records the `modifiedTime` of the remote version the engine
//! last applied locally or last produced with a write. It starts at the Unix
//! epoch so the very first poll always pulls an existing remote file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Remote timestamp the local document was last reconciled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// The initial watermark: 1970-01-01T00:00:00Z.
    #[must_use]
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::default())
    }

    /// Creates a watermark at the given remote timestamp.
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    /// Returns the underlying timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns true if the watermark has never been advanced.
    pub fn is_epoch(&self) -> bool {
        *self == Self::epoch()
    }

    /// Returns true if a remote version modified at `remote` should be pulled.
    ///
    /// The remote must be newer than the watermark by strictly more than
    /// `margin`. Remote versions at or below the margin are treated as the
    /// engine's own recent writes.
    pub fn is_stale(&self, remote: DateTime<Utc>, margin: Duration) -> bool {
        let ahead_ms = i128::from(remote.timestamp_millis()) - i128::from(self.0.timestamp_millis());
        ahead_ms > margin.as_millis() as i128
    }

    /// Moves the watermark to `timestamp`.
    pub fn advance_to(&mut self, timestamp: DateTime<Utc>) {
        self.0 = timestamp;
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
