//! Tests for the checkpoint store (in-memory SQLite).

use std::sync::Arc;
use std::time::Duration;

use super::{Checkpoint, CheckpointStore, CheckpointUpdate, SqliteCheckpointStore};

const HOUR_MS: i64 = 60 * 60 * 1000;

fn changed(fp: &str) -> CheckpointUpdate {
    CheckpointUpdate::Changed {
        fingerprint: fp.to_string(),
    }
}

fn unchanged(fp: &str) -> CheckpointUpdate {
    CheckpointUpdate::Unchanged {
        fingerprint: fp.to_string(),
    }
}

#[tokio::test]
async fn missing_checkpoint_is_absent_and_stale() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    assert!(store.get("alpha#1", "overview").await.unwrap().is_none());
    assert!(store
        .is_stale("alpha#1", "overview", Duration::from_secs(60), 0)
        .await
        .unwrap());
}

#[tokio::test]
async fn changed_sets_all_times_and_fingerprint() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    let cp = store
        .record_attempt("alpha#1", "overview", &changed("aa"), 1_000)
        .await
        .unwrap();
    assert_eq!(
        cp,
        Checkpoint {
            subject: "alpha#1".to_string(),
            target: "overview".to_string(),
            last_success_at: Some(1_000),
            last_verified_at: Some(1_000),
            last_attempt_at: Some(1_000),
            consecutive_failures: 0,
            fingerprint: Some("aa".to_string()),
        }
    );
    assert_eq!(store.get("alpha#1", "overview").await.unwrap(), Some(cp));
}

#[tokio::test]
async fn failures_count_up_and_reset_on_success() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    store
        .record_attempt("alpha#1", "history", &changed("aa"), 1_000)
        .await
        .unwrap();
    for (i, at) in [2_000, 3_000, 4_000].into_iter().enumerate() {
        let cp = store
            .record_attempt("alpha#1", "history", &CheckpointUpdate::Failed, at)
            .await
            .unwrap();
        assert_eq!(cp.consecutive_failures, i as u32 + 1);
        assert_eq!(cp.last_attempt_at, Some(at));
        // Failure keeps the last good data.
        assert_eq!(cp.last_success_at, Some(1_000));
        assert_eq!(cp.fingerprint.as_deref(), Some("aa"));
    }

    let cp = store
        .record_attempt("alpha#1", "history", &unchanged("aa"), 5_000)
        .await
        .unwrap();
    assert_eq!(cp.consecutive_failures, 0);
}

#[tokio::test]
async fn fatal_only_moves_attempt_time() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    store
        .record_attempt("alpha#1", "history", &CheckpointUpdate::Failed, 1_000)
        .await
        .unwrap();
    let cp = store
        .record_attempt("alpha#1", "history", &CheckpointUpdate::Fatal, 2_000)
        .await
        .unwrap();
    assert_eq!(cp.consecutive_failures, 1);
    assert_eq!(cp.last_attempt_at, Some(2_000));
    assert_eq!(cp.last_success_at, None);

    let fresh = store
        .record_attempt("alpha#1", "overview", &CheckpointUpdate::Fatal, 3_000)
        .await
        .unwrap();
    assert_eq!(fresh.consecutive_failures, 0);
    assert_eq!(fresh.last_attempt_at, Some(3_000));
}

#[tokio::test]
async fn unchanged_keeps_success_time_but_refreshes_staleness() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    let two_hours = Duration::from_secs(2 * 60 * 60);
    store
        .record_attempt("alpha#1", "overview", &changed("aa"), 0)
        .await
        .unwrap();
    assert!(store
        .is_stale("alpha#1", "overview", two_hours, 3 * HOUR_MS)
        .await
        .unwrap());

    let cp = store
        .record_attempt("alpha#1", "overview", &unchanged("aa"), 3 * HOUR_MS)
        .await
        .unwrap();
    assert_eq!(cp.last_success_at, Some(0));
    assert_eq!(cp.last_verified_at, Some(3 * HOUR_MS));
    assert!(!store
        .is_stale("alpha#1", "overview", two_hours, 4 * HOUR_MS)
        .await
        .unwrap());
}

#[tokio::test]
async fn staleness_boundary_is_exclusive() {
    let cp = Checkpoint {
        subject: "alpha#1".to_string(),
        target: "overview".to_string(),
        last_success_at: Some(1_000),
        last_verified_at: None,
        last_attempt_at: Some(1_000),
        consecutive_failures: 0,
        fingerprint: None,
    };
    let threshold = Duration::from_millis(500);
    assert!(!cp.is_stale(threshold, 1_500));
    assert!(cp.is_stale(threshold, 1_501));

    let never = Checkpoint {
        last_success_at: None,
        ..cp
    };
    assert!(never.is_stale(threshold, 0));
}

#[tokio::test]
async fn list_for_subject_is_scoped_and_sorted() {
    let store = SqliteCheckpointStore::open_in_memory().await.unwrap();
    store
        .record_attempt("alpha#1", "overview", &changed("a"), 1)
        .await
        .unwrap();
    store
        .record_attempt("alpha#1", "history", &changed("b"), 2)
        .await
        .unwrap();
    store
        .record_attempt("bravo#2", "overview", &changed("c"), 3)
        .await
        .unwrap();

    let targets: Vec<_> = store
        .list_for_subject("alpha#1")
        .await
        .unwrap()
        .into_iter()
        .map(|cp| cp.target)
        .collect();
    assert_eq!(targets, ["history", "overview"]);
    assert_eq!(store.list_subjects().await.unwrap(), ["alpha#1", "bravo#2"]);
}

#[tokio::test]
async fn concurrent_failures_on_one_key_are_not_lost() {
    let store = Arc::new(SqliteCheckpointStore::open_in_memory().await.unwrap());
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10 {
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            store
                .record_attempt("alpha#1", "overview", &CheckpointUpdate::Failed, i)
                .await
                .unwrap();
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    let cp = store.get("alpha#1", "overview").await.unwrap().unwrap();
    assert_eq!(cp.consecutive_failures, 10);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state dir").join("checkpoints.db");
    {
        let store = SqliteCheckpointStore::open_at(&path).await.unwrap();
        store
            .record_attempt("alpha#1", "overview", &changed("aa"), 42)
            .await
            .unwrap();
    }
    let store = SqliteCheckpointStore::open_at(&path).await.unwrap();
    let cp = store.get("alpha#1", "overview").await.unwrap().unwrap();
    assert_eq!(cp.last_success_at, Some(42));
}
