//! Terminal outcome of one target fetch.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::checkpoint::CheckpointUpdate;
use crate::retry::ErrorKind;

/// Normalized body of a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(serde_json::Value),
    Html(String),
}

impl Payload {
    /// Canonical text the fingerprint is computed over. JSON objects
    /// serialize with sorted keys, so key order in the response is irrelevant.
    pub fn canonical(&self) -> String {
        match self {
            Payload::Json(v) => v.to_string(),
            Payload::Html(s) => s.clone(),
        }
    }

    /// SHA-256 of the canonical text as lowercase hex.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.canonical().as_bytes());
        hex::encode(digest)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// New payload; forwarded to the sink.
    Success { payload: Payload, fingerprint: String },
    /// Payload identical to the stored fingerprint; not forwarded.
    Unchanged { fingerprint: String },
    SoftBlocked,
    RateLimited,
    Transient(String),
    NotFound,
    Fatal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Unchanged,
    SoftBlocked,
    RateLimited,
    Transient,
    NotFound,
    Fatal,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Unchanged => "unchanged",
            OutcomeKind::SoftBlocked => "soft_blocked",
            OutcomeKind::RateLimited => "rate_limited",
            OutcomeKind::Transient => "transient",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::Fatal => "fatal",
        }
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Unchanged { .. } => OutcomeKind::Unchanged,
            Outcome::SoftBlocked => OutcomeKind::SoftBlocked,
            Outcome::RateLimited => OutcomeKind::RateLimited,
            Outcome::Transient(_) => OutcomeKind::Transient,
            Outcome::NotFound => OutcomeKind::NotFound,
            Outcome::Fatal(_) => OutcomeKind::Fatal,
        }
    }

    /// Success or Unchanged.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::Unchanged { .. })
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Retry classification; `None` for successes.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } | Outcome::Unchanged { .. } => None,
            Outcome::SoftBlocked => Some(ErrorKind::Blocked),
            Outcome::RateLimited => Some(ErrorKind::Throttled),
            Outcome::Transient(_) => Some(ErrorKind::Transient),
            Outcome::NotFound => Some(ErrorKind::NotFound),
            Outcome::Fatal(_) => Some(ErrorKind::Fatal),
        }
    }

    /// Human-readable cause for failures.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Outcome::Transient(c) | Outcome::Fatal(c) => Some(c),
            _ => None,
        }
    }

    pub fn checkpoint_update(&self) -> CheckpointUpdate {
        match self {
            Outcome::Success { fingerprint, .. } => CheckpointUpdate::Changed {
                fingerprint: fingerprint.clone(),
            },
            Outcome::Unchanged { fingerprint } => CheckpointUpdate::Unchanged {
                fingerprint: fingerprint.clone(),
            },
            Outcome::Fatal(_) => CheckpointUpdate::Fatal,
            Outcome::SoftBlocked
            | Outcome::RateLimited
            | Outcome::Transient(_)
            | Outcome::NotFound => CheckpointUpdate::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":[1,2]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{ "a": [1, 2], "b": 1 }"#).unwrap();
        assert_eq!(Payload::Json(a).fingerprint(), Payload::Json(b).fingerprint());
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            Payload::Html("hello\n".into()).fingerprint(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn checkpoint_update_per_outcome() {
        assert_eq!(
            Outcome::Unchanged {
                fingerprint: "f".into()
            }
            .checkpoint_update(),
            CheckpointUpdate::Unchanged {
                fingerprint: "f".into()
            }
        );
        assert_eq!(Outcome::NotFound.checkpoint_update(), CheckpointUpdate::Failed);
        assert_eq!(
            Outcome::Fatal("bad".into()).checkpoint_update(),
            CheckpointUpdate::Fatal
        );
        assert!(Outcome::RateLimited.error_kind().unwrap().is_retryable());
        assert!(!Outcome::NotFound.error_kind().unwrap().is_retryable());
    }
}
