//! Checkpoint write: one atomic upsert per resolved fetch attempt.

use anyhow::Result;
use async_trait::async_trait;

use super::db::SqliteCheckpointStore;
use super::read::row_to_checkpoint;
use super::{Checkpoint, CheckpointStore, CheckpointUpdate};

/// Column values inserted when the row does not exist yet.
/// On conflict, NULL means "keep the stored value".
struct Columns {
    success_at: Option<i64>,
    verified_at: Option<i64>,
    failures: i64,
}

fn columns_for(update: &CheckpointUpdate, at: i64) -> Columns {
    match update {
        CheckpointUpdate::Changed { .. } => Columns {
            success_at: Some(at),
            verified_at: Some(at),
            failures: 0,
        },
        CheckpointUpdate::Unchanged { .. } => Columns {
            success_at: None,
            verified_at: Some(at),
            failures: 0,
        },
        CheckpointUpdate::Failed => Columns {
            success_at: None,
            verified_at: None,
            failures: 1,
        },
        CheckpointUpdate::Fatal => Columns {
            success_at: None,
            verified_at: None,
            failures: 0,
        },
    }
}

impl SqliteCheckpointStore {
    async fn upsert(
        &self,
        subject: &str,
        target: &str,
        update: &CheckpointUpdate,
        at: i64,
    ) -> Result<Checkpoint> {
        let cols = columns_for(update, at);
        // Single statement, so concurrent writers to the same key are
        // linearized by SQLite and never interleave read-modify-write.
        let row = sqlx::query(
            r#"
            INSERT INTO checkpoints (
                subject, target, last_success_at, last_verified_at,
                last_attempt_at, consecutive_failures, fingerprint
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(subject, target) DO UPDATE SET
                last_success_at = COALESCE(excluded.last_success_at, checkpoints.last_success_at),
                last_verified_at = COALESCE(excluded.last_verified_at, checkpoints.last_verified_at),
                last_attempt_at = excluded.last_attempt_at,
                consecutive_failures = CASE ?8
                    WHEN 'failed' THEN checkpoints.consecutive_failures + 1
                    WHEN 'fatal' THEN checkpoints.consecutive_failures
                    ELSE 0
                END,
                fingerprint = COALESCE(excluded.fingerprint, checkpoints.fingerprint)
            RETURNING subject, target, last_success_at, last_verified_at,
                      last_attempt_at, consecutive_failures, fingerprint
            "#,
        )
        .bind(subject)
        .bind(target)
        .bind(cols.success_at)
        .bind(cols.verified_at)
        .bind(at)
        .bind(cols.failures)
        .bind(update.fingerprint())
        .bind(update.kind())
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_checkpoint(&row))
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, subject: &str, target: &str) -> Result<Option<Checkpoint>> {
        self.get_row(subject, target).await
    }

    async fn record_attempt(
        &self,
        subject: &str,
        target: &str,
        update: &CheckpointUpdate,
        at_millis: i64,
    ) -> Result<Checkpoint> {
        let cp = self.upsert(subject, target, update, at_millis).await?;
        tracing::debug!(
            subject,
            target,
            update = update.kind(),
            failures = cp.consecutive_failures,
            "checkpoint recorded"
        );
        Ok(cp)
    }

    async fn list_for_subject(&self, subject: &str) -> Result<Vec<Checkpoint>> {
        self.list_rows(subject).await
    }
}
