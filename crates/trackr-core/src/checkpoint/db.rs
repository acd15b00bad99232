//! SQLite-backed checkpoint store: connection and migrations.
//!
//! Row reads live in `read`, the upsert in `write`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the checkpoint database.
///
/// The default file lives under the XDG state directory:
/// `~/.local/state/trackr/checkpoints.db`.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl SqliteCheckpointStore {
    /// Open (or create) the default checkpoint database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("trackr")?;
        let db_path = xdg_dirs.get_state_home().join("checkpoints.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = SqliteCheckpointStore { pool };
        store.migrate().await?;
        tracing::debug!("checkpoint store opened at {}", path.display());
        Ok(store)
    }

    /// In-memory database (single connection so every query sees the same data).
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteCheckpointStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per (subject, target). Times are Unix millis; NULL = never.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                subject TEXT NOT NULL,
                target TEXT NOT NULL,
                last_success_at INTEGER,
                last_verified_at INTEGER,
                last_attempt_at INTEGER,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                fingerprint TEXT,
                PRIMARY KEY (subject, target)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
