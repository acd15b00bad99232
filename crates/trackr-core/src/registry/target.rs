//! Target descriptors and the enums that classify them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::subject::encode_subject;

/// Importance class of a target. Ordering is fetch order: critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Critical,
    Standard,
    Casual,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Critical => "critical",
            Category::Standard => "standard",
            Category::Casual => "casual",
        }
    }
}

/// Shape the target site answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// JSON API response (possibly wrapped in a browser `<pre>` by the gateway).
    #[default]
    Json,
    /// Rendered HTML page.
    Html,
}

/// Which targets a session selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every registry target, regardless of staleness (first discovery).
    Init,
    /// Only stale registry targets.
    Update,
    /// Every registry target plus the diagnostic targets.
    Full,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Init => "init",
            Mode::Update => "update",
            Mode::Full => "full",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "init" => Ok(Mode::Init),
            "update" => Ok(Mode::Update),
            "full" => Ok(Mode::Full),
            other => anyhow::bail!("unknown mode {other:?} (expected init, update or full)"),
        }
    }
}

/// One fetchable resource for a subject. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub id: String,
    /// URL with a `{subject}` placeholder.
    pub url_template: String,
    pub category: Category,
    pub staleness: Duration,
    pub format: PayloadFormat,
    /// Exploratory target fetched only in Full mode; never counts toward
    /// the session's priority or status.
    pub diagnostic: bool,
}

impl TargetDescriptor {
    /// Placeholder substituted with the encoded subject.
    pub const PLACEHOLDER: &'static str = "{subject}";

    /// Concrete URL for `subject`.
    pub fn url_for(&self, subject: &str) -> String {
        self.url_template
            .replace(Self::PLACEHOLDER, &encode_subject(subject))
    }
}
