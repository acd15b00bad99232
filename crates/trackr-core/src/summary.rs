//! Result aggregator: a pure function from a finished session to its summary.

use serde::Serialize;

use crate::fetch::OutcomeKind;
use crate::registry::Mode;
use crate::session::Session;

/// Overall freshness verdict for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// Nothing was stale; no target selected.
    Fresh,
    /// At least one target produced a changed payload.
    Updated,
    /// Every target succeeded with an identical payload.
    Unchanged,
    /// Some targets failed or were skipped.
    Partial,
    /// Targets were attempted and none succeeded.
    Failed,
}

impl CheckpointStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointStatus::Fresh => "fresh",
            CheckpointStatus::Updated => "updated",
            CheckpointStatus::Unchanged => "unchanged",
            CheckpointStatus::Partial => "partial",
            CheckpointStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvasionStats {
    /// Two consecutive tries presented different identities to the site. A
    /// gateway that fixes the identity per session only rotates on retries.
    pub identity_rotated: bool,
    pub delays_applied: bool,
    pub proxy_used: bool,
    pub retry_count: u32,
}

/// One target that ended without data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    pub target: String,
    pub kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub diagnostic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub subject: String,
    pub mode: Mode,
    pub successful: usize,
    pub total_endpoints: usize,
    pub priority_achieved: bool,
    pub checkpoint_status: CheckpointStatus,
    pub evasion_stats: EvasionStats,
    pub failures: Vec<TargetFailure>,
    pub cancelled: bool,
    /// Set when the session could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionSummary {
    /// Summary for a session that never ran (invalid subject, task failure).
    pub fn aborted(subject: &str, mode: Mode, error: String) -> Self {
        Self {
            subject: subject.to_string(),
            mode,
            successful: 0,
            total_endpoints: 0,
            priority_achieved: false,
            checkpoint_status: CheckpointStatus::Failed,
            evasion_stats: EvasionStats::default(),
            failures: Vec::new(),
            cancelled: false,
            error: Some(error),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(
            self.checkpoint_status,
            CheckpointStatus::Fresh | CheckpointStatus::Updated | CheckpointStatus::Unchanged
        )
    }
}

/// Summarize a finished session.
///
/// Diagnostic attempts show up in `failures` and evasion stats but never in
/// the counts, the priority flag or the status.
pub fn summarize(session: &Session) -> SessionSummary {
    let total_endpoints = session.selected.iter().filter(|t| !t.diagnostic).count();
    let counted: Vec<_> = session.attempts.iter().filter(|a| !a.diagnostic).collect();
    let successful = counted.iter().filter(|a| a.outcome.is_success()).count();
    let changed = counted.iter().any(|a| a.outcome.is_changed());

    let checkpoint_status = if total_endpoints == 0 {
        CheckpointStatus::Fresh
    } else if !counted.is_empty() && successful == 0 {
        CheckpointStatus::Failed
    } else if successful < total_endpoints {
        CheckpointStatus::Partial
    } else if changed {
        CheckpointStatus::Updated
    } else {
        CheckpointStatus::Unchanged
    };

    let failures = session
        .attempts
        .iter()
        .filter(|a| !a.outcome.is_success())
        .map(|a| TargetFailure {
            target: a.target.clone(),
            kind: a.outcome.kind(),
            cause: a.outcome.cause().map(str::to_string),
            diagnostic: a.diagnostic,
        })
        .collect();

    SessionSummary {
        subject: session.subject.clone(),
        mode: session.mode,
        successful,
        total_endpoints,
        priority_achieved: session.priority_achieved(),
        checkpoint_status,
        evasion_stats: evasion_stats(session),
        failures,
        cancelled: session.cancelled,
        error: None,
    }
}

fn evasion_stats(session: &Session) -> EvasionStats {
    let mut identities = session
        .previous_identity
        .iter()
        .chain(session.attempts.iter().flat_map(|a| a.identities.iter()));
    let mut identity_rotated = false;
    if let Some(mut prev) = identities.next() {
        for next in identities {
            if next != prev {
                identity_rotated = true;
                break;
            }
            prev = next;
        }
    }

    EvasionStats {
        identity_rotated,
        delays_applied: session.attempts.iter().any(|a| !a.paced.is_zero()),
        proxy_used: session.proxy.is_some() && !session.attempts.is_empty(),
        retry_count: session.attempts.iter().map(|a| a.retries).sum(),
    }
}
