//! Responses handed to the route layer.
//!
//! `update_subject` and `bulk_update` always return a well-formed response;
//! every failure is folded into `status = partial` and `error_details`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::control::{CancelToken, RunControl};
use crate::pipeline::Pipeline;
use crate::registry::Mode;
use crate::subject::validate_subject;
use crate::summary::{CheckpointStatus, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub successful: usize,
    pub total_endpoints: usize,
    pub priority_achieved: bool,
    pub checkpoint_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiDetection {
    pub identity_rotated: bool,
    pub delays_applied: bool,
    pub proxy_used: bool,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub subject: String,
    pub status: ResponseStatus,
    pub update_summary: UpdateSummary,
    pub anti_detection: AntiDetection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl From<&SessionSummary> for UpdateResponse {
    fn from(s: &SessionSummary) -> Self {
        let status = match s.checkpoint_status {
            CheckpointStatus::Fresh | CheckpointStatus::Updated | CheckpointStatus::Unchanged => {
                ResponseStatus::Success
            }
            CheckpointStatus::Partial | CheckpointStatus::Failed => ResponseStatus::Partial,
        };
        UpdateResponse {
            subject: s.subject.clone(),
            status,
            update_summary: UpdateSummary {
                successful: s.successful,
                total_endpoints: s.total_endpoints,
                priority_achieved: s.priority_achieved,
                checkpoint_status: s.checkpoint_status.as_str().to_string(),
            },
            anti_detection: AntiDetection {
                identity_rotated: s.evasion_stats.identity_rotated,
                delays_applied: s.evasion_stats.delays_applied,
                proxy_used: s.evasion_stats.proxy_used,
                retry_count: s.evasion_stats.retry_count,
            },
            error_details: error_details(s),
        }
    }
}

fn error_details(s: &SessionSummary) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(e) = &s.error {
        parts.push(e.clone());
    }
    for f in s.failures.iter().filter(|f| !f.diagnostic) {
        match &f.cause {
            Some(cause) => parts.push(format!("{}: {} ({})", f.target, f.kind.as_str(), cause)),
            None => parts.push(format!("{}: {}", f.target, f.kind.as_str())),
        }
    }
    if s.cancelled {
        parts.push("cancelled before all targets ran".to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Refresh one subject in `mode` (the route layer defaults to [`Mode::Update`]).
pub async fn update_subject(pipeline: &Pipeline, subject: &str, mode: Mode) -> UpdateResponse {
    let summary = match validate_subject(subject) {
        Ok(subject) => pipeline.update(&subject, mode, &CancelToken::new()).await,
        Err(e) => SessionSummary::aborted(subject, mode, format!("{e:#}")),
    };
    UpdateResponse::from(&summary)
}

/// Refresh many subjects in Update mode, at most `max_concurrent` at once
/// (configured default when `None`). One response per subject, input order.
pub async fn bulk_update(
    pipeline: &Pipeline,
    subjects: &[String],
    max_concurrent: Option<usize>,
) -> Vec<UpdateResponse> {
    pipeline
        .run_bulk(
            subjects,
            Mode::Update,
            max_concurrent,
            Arc::new(RunControl::new()),
        )
        .await
        .iter()
        .map(UpdateResponse::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::OutcomeKind;
    use crate::summary::{EvasionStats, TargetFailure};

    fn summary(status: CheckpointStatus) -> SessionSummary {
        SessionSummary {
            subject: "alpha#1".into(),
            mode: Mode::Update,
            successful: 1,
            total_endpoints: 2,
            priority_achieved: true,
            checkpoint_status: status,
            evasion_stats: EvasionStats {
                identity_rotated: true,
                delays_applied: true,
                proxy_used: false,
                retry_count: 2,
            },
            failures: vec![TargetFailure {
                target: "loadout".into(),
                kind: OutcomeKind::Transient,
                cause: Some("gateway timed out: 60s".into()),
                diagnostic: false,
            }],
            cancelled: false,
            error: None,
        }
    }

    #[test]
    fn partial_session_serializes_with_error_details() {
        let resp = UpdateResponse::from(&summary(CheckpointStatus::Partial));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["status"], "partial");
        assert_eq!(v["update_summary"]["checkpoint_status"], "partial");
        assert_eq!(v["update_summary"]["total_endpoints"], 2);
        assert_eq!(v["anti_detection"]["retry_count"], 2);
        assert_eq!(
            v["error_details"],
            "loadout: transient (gateway timed out: 60s)"
        );
    }

    #[test]
    fn clean_statuses_map_to_success() {
        for status in [
            CheckpointStatus::Fresh,
            CheckpointStatus::Updated,
            CheckpointStatus::Unchanged,
        ] {
            let mut s = summary(status);
            s.failures.clear();
            let resp = UpdateResponse::from(&s);
            assert_eq!(resp.status, ResponseStatus::Success);
            assert!(resp.error_details.is_none());
            let v = serde_json::to_value(&resp).unwrap();
            assert!(v.get("error_details").is_none());
        }
        let failed = UpdateResponse::from(&summary(CheckpointStatus::Failed));
        assert_eq!(failed.status, ResponseStatus::Partial);
    }

    #[test]
    fn aborted_summary_reports_error() {
        let resp = UpdateResponse::from(&SessionSummary::aborted(
            "",
            Mode::Update,
            "subject must not be empty".into(),
        ));
        assert_eq!(resp.status, ResponseStatus::Partial);
        assert_eq!(resp.error_details.as_deref(), Some("subject must not be empty"));
    }
}
