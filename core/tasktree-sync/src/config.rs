//! Sync engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the remote document file.
pub const DEFAULT_FILE_NAME: &str = "TaskTree.json";

/// What the write cycle does when a write fails with a transient error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Tear the session down on the first failure.
    Invalidate,
    /// Retry with exponential backoff capped at the poll interval; tear the
    /// session down after `max_consecutive_failures` failures in a row.
    Retry {
        max_consecutive_failures: u32,
        initial_backoff_ms: u64,
    },
}

impl WriteFailurePolicy {
    /// Delay before retry number `failures` (1-based), or `None` once the
    /// failure count calls for invalidation.
    pub fn backoff(&self, failures: u32, cap: Duration) -> Option<Duration> {
        match self {
            WriteFailurePolicy::Invalidate => None,
            WriteFailurePolicy::Retry {
                max_consecutive_failures,
                initial_backoff_ms,
            } => {
                if failures >= *max_consecutive_failures {
                    return None;
                }
                let factor = 1u64 << failures.saturating_sub(1).min(20);
                let delay = Duration::from_millis(initial_backoff_ms.saturating_mul(factor));
                Some(delay.min(cap))
            }
        }
    }
}

impl Default for WriteFailurePolicy {
    fn default() -> Self {
        WriteFailurePolicy::Retry {
            max_consecutive_failures: 5,
            initial_backoff_ms: 1_000,
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the remote document file.
    pub file_name: String,
    /// Period of the poll-read cycle (ms).
    pub poll_interval_ms: u64,
    /// Quiet period after the last mutation before a write fires (ms).
    pub debounce_ms: u64,
    /// How far the remote must be ahead of the watermark to be pulled (ms).
    pub staleness_margin_ms: u64,
    /// Upper bound on every remote call (ms).
    pub request_timeout_ms: u64,
    /// Write the local document when the remote file does not exist yet.
    pub seed_when_absent: bool,
    /// Handling of transient write failures.
    pub write_failure: WriteFailurePolicy,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn staleness_margin(&self) -> Duration {
        Duration::from_millis(self.staleness_margin_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            poll_interval_ms: 10_000,
            debounce_ms: 3_000,
            staleness_margin_ms: 3_000,
            request_timeout_ms: 30_000,
            seed_when_absent: false,
            write_failure: WriteFailurePolicy::default(),
        }
    }
}
