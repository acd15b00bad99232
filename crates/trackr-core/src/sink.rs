//! Payload sink: where changed payloads go once fetched.
//!
//! The pipeline never stores payloads itself; it forwards every changed
//! payload to a [`PayloadSink`]. [`JsonFileSink`] is the local implementation
//! used by the CLI: one JSON document per fetch under
//! `<dir>/<subject>/<target>-<millis>.json`, written to a `.part` file and
//! renamed into place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::clock::unix_millis;
use crate::fetch::Payload;

#[async_trait]
pub trait PayloadSink: Send + Sync {
    async fn store(
        &self,
        subject: &str,
        target: &str,
        payload: &Payload,
        fingerprint: &str,
    ) -> Result<()>;
}

/// Document written for each stored payload.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    subject: &'a str,
    target: &'a str,
    fingerprint: &'a str,
    fetched_at: i64,
    data: &'a Payload,
}

/// Writes payloads as JSON files below a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    root: PathBuf,
}

impl JsonFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one subject's payloads.
    pub fn subject_dir(&self, subject: &str) -> PathBuf {
        self.root.join(sanitize_component(subject))
    }
}

#[async_trait]
impl PayloadSink for JsonFileSink {
    async fn store(
        &self,
        subject: &str,
        target: &str,
        payload: &Payload,
        fingerprint: &str,
    ) -> Result<()> {
        let fetched_at = unix_millis();
        let dir = self.subject_dir(subject);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;

        let envelope = Envelope {
            subject,
            target,
            fingerprint,
            fetched_at,
            data: payload,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let name = format!("{}-{}.json", sanitize_component(target), fetched_at);
        let final_path = dir.join(&name);
        let temp_path = dir.join(format!("{name}.part"));
        tokio::fs::write(&temp_path, &bytes)
            .await
            .with_context(|| format!("write {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    temp_path.display(),
                    final_path.display()
                )
            })?;

        tracing::debug!(subject, target, path = %final_path.display(), "payload stored");
        Ok(())
    }
}

/// Make a subject or target id safe as one path component.
///
/// Replaces separators, control characters and whitespace with `_`, collapses
/// runs of `_`, trims dots and underscores, and caps the length at 255 bytes.
pub fn sanitize_component(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let trimmed = if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        &trimmed[..take]
    } else {
        trimmed
    };

    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
