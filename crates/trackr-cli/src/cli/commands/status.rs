//! `trackr status [subject]` – show checkpoints.

use anyhow::Result;
use std::time::Duration;
use trackr_core::checkpoint::{Checkpoint, CheckpointStore, SqliteCheckpointStore};
use trackr_core::clock::unix_millis;
use trackr_core::config::PipelineConfig;
use trackr_core::registry::PriorityRegistry;

pub async fn run_status(
    store: &SqliteCheckpointStore,
    cfg: &PipelineConfig,
    subject: Option<&str>,
) -> Result<()> {
    let Some(subject) = subject else {
        let subjects = store.list_subjects().await?;
        if subjects.is_empty() {
            println!("No checkpoints in database.");
        }
        for s in subjects {
            println!("{s}");
        }
        return Ok(());
    };

    let checkpoints = store.list_for_subject(subject).await?;
    if checkpoints.is_empty() {
        println!("No checkpoints for {subject}.");
        return Ok(());
    }

    let registry = PriorityRegistry::from_config(cfg)?;
    let now = unix_millis();
    println!(
        "{:<28} {:<10} {:<10} {:<10} {:<5} {}",
        "TARGET", "SUCCESS", "VERIFIED", "ATTEMPT", "FAILS", "STALE"
    );
    for cp in checkpoints {
        println!(
            "{:<28} {:<10} {:<10} {:<10} {:<5} {}",
            cp.target,
            age(cp.last_success_at, now),
            age(cp.last_verified_at, now),
            age(cp.last_attempt_at, now),
            cp.consecutive_failures,
            stale_label(&cp, &registry, now)
        );
    }
    Ok(())
}

fn stale_label(cp: &Checkpoint, registry: &PriorityRegistry, now: i64) -> &'static str {
    match registry.get(&cp.target) {
        Some(t) if t.diagnostic => "-",
        Some(t) if cp.is_stale(t.staleness, now) => "yes",
        Some(_) => "no",
        None => "unknown",
    }
}

/// Human age of a millisecond timestamp, e.g. `5m ago`.
fn age(at: Option<i64>, now: i64) -> String {
    let Some(at) = at else {
        return "-".to_string();
    };
    let secs = Duration::from_millis(now.saturating_sub(at).max(0) as u64).as_secs();
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::age;

    #[test]
    fn age_buckets() {
        let now = 10_000_000;
        assert_eq!(age(None, now), "-");
        assert_eq!(age(Some(now - 5_000), now), "5s ago");
        assert_eq!(age(Some(now - 120_000), now), "2m ago");
        assert_eq!(age(Some(now - 7_200_000), now), "2h ago");
        assert_eq!(age(Some(now + 1_000), now), "0s ago");
    }
}
