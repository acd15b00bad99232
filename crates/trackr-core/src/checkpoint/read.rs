//! Checkpoint read operations: get and list.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::SqliteCheckpointStore;
use super::Checkpoint;

pub(super) fn row_to_checkpoint(row: &SqliteRow) -> Checkpoint {
    let failures: i64 = row.get("consecutive_failures");
    Checkpoint {
        subject: row.get("subject"),
        target: row.get("target"),
        last_success_at: row.get("last_success_at"),
        last_verified_at: row.get("last_verified_at"),
        last_attempt_at: row.get("last_attempt_at"),
        consecutive_failures: u32::try_from(failures).unwrap_or(u32::MAX),
        fingerprint: row.get("fingerprint"),
    }
}

impl SqliteCheckpointStore {
    pub(super) async fn get_row(&self, subject: &str, target: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT subject, target, last_success_at, last_verified_at,
                   last_attempt_at, consecutive_failures, fingerprint
            FROM checkpoints
            WHERE subject = ?1 AND target = ?2
            "#,
        )
        .bind(subject)
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_checkpoint))
    }

    pub(super) async fn list_rows(&self, subject: &str) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(
            r#"
            SELECT subject, target, last_success_at, last_verified_at,
                   last_attempt_at, consecutive_failures, fingerprint
            FROM checkpoints
            WHERE subject = ?1
            ORDER BY target ASC
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_checkpoint).collect())
    }

    /// Every subject with at least one checkpoint, sorted.
    pub async fn list_subjects(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(r#"SELECT DISTINCT subject FROM checkpoints ORDER BY subject ASC"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("subject")).collect())
    }
}
