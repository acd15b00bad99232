//! Durable per-(subject, target) fetch checkpoints.
//!
//! A checkpoint remembers when a target last yielded a changed payload, when
//! it was last confirmed unchanged, when it was last attempted, how many
//! non-fatal failures happened in a row, and the fingerprint of the last
//! payload. Rows are upserted, never deleted.

mod db;
mod read;
mod write;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use db::SqliteCheckpointStore;

/// Stored fetch state for one (subject, target) pair. Timestamps are Unix millis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub subject: String,
    pub target: String,
    /// Last attempt that produced a changed payload.
    pub last_success_at: Option<i64>,
    /// Last attempt that confirmed the stored fingerprint is still current.
    pub last_verified_at: Option<i64>,
    pub last_attempt_at: Option<i64>,
    pub consecutive_failures: u32,
    pub fingerprint: Option<String>,
}

impl Checkpoint {
    /// Most recent moment the stored data was known to be current.
    pub fn last_fresh_at(&self) -> Option<i64> {
        match (self.last_success_at, self.last_verified_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// True when the data is older than `staleness` at `now_millis`, or was never fetched.
    pub fn is_stale(&self, staleness: Duration, now_millis: i64) -> bool {
        match self.last_fresh_at() {
            None => true,
            Some(at) => {
                let threshold = i64::try_from(staleness.as_millis()).unwrap_or(i64::MAX);
                now_millis.saturating_sub(at) > threshold
            }
        }
    }
}

/// How a resolved fetch attempt changes a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointUpdate {
    /// New payload stored: advances success, verification and attempt times.
    Changed { fingerprint: String },
    /// Payload identical to the stored one: resets failures, keeps `last_success_at`.
    Unchanged { fingerprint: String },
    /// Non-fatal failure (blocked, throttled, transient, not found).
    Failed,
    /// Unexpected response: only the attempt time moves.
    Fatal,
}

impl CheckpointUpdate {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CheckpointUpdate::Changed { .. } => "changed",
            CheckpointUpdate::Unchanged { .. } => "unchanged",
            CheckpointUpdate::Failed => "failed",
            CheckpointUpdate::Fatal => "fatal",
        }
    }

    pub(crate) fn fingerprint(&self) -> Option<&str> {
        match self {
            CheckpointUpdate::Changed { fingerprint }
            | CheckpointUpdate::Unchanged { fingerprint } => Some(fingerprint),
            CheckpointUpdate::Failed | CheckpointUpdate::Fatal => None,
        }
    }
}

/// Persistence seam for checkpoints. Writes for one key are linearized;
/// writes for distinct keys never wait on each other's logic.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, subject: &str, target: &str) -> Result<Option<Checkpoint>>;

    /// Apply `update` observed at `at_millis` and return the resulting row.
    async fn record_attempt(
        &self,
        subject: &str,
        target: &str,
        update: &CheckpointUpdate,
        at_millis: i64,
    ) -> Result<Checkpoint>;

    /// Staleness check; a missing checkpoint is stale.
    async fn is_stale(
        &self,
        subject: &str,
        target: &str,
        staleness: Duration,
        now_millis: i64,
    ) -> Result<bool> {
        Ok(match self.get(subject, target).await? {
            Some(cp) => cp.is_stale(staleness, now_millis),
            None => true,
        })
    }

    /// Every checkpoint of `subject`, ordered by target id.
    async fn list_for_subject(&self, subject: &str) -> Result<Vec<Checkpoint>>;
}
