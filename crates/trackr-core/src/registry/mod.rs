//! Priority registry: the fixed set of targets tracked per subject.
//!
//! Built once from the injected configuration and read-only afterwards.
//! Lookups always return targets critical-first, then standard, then casual;
//! within a category the configured order is kept.

mod defaults;
mod target;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::{PipelineConfig, TargetConfig};

pub use defaults::{default_diagnostics, default_targets};
pub use target::{Category, Mode, PayloadFormat, TargetDescriptor};

/// Read-only lookup of target descriptors.
#[derive(Debug, Clone)]
pub struct PriorityRegistry {
    targets: Vec<TargetDescriptor>,
    diagnostics: Vec<TargetDescriptor>,
}

impl PriorityRegistry {
    /// Build the registry from the `[[targets]]` and `[[diagnostics]]` tables.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let targets = cfg
            .targets
            .iter()
            .map(|t| describe(t, false))
            .collect::<Vec<_>>();
        let diagnostics = cfg
            .diagnostics
            .iter()
            .map(|t| describe(t, true))
            .collect::<Vec<_>>();
        Self::new(targets, diagnostics)
    }

    /// Build from descriptors, validating ids and templates.
    pub fn new(
        mut targets: Vec<TargetDescriptor>,
        diagnostics: Vec<TargetDescriptor>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for t in targets.iter().chain(diagnostics.iter()) {
            if t.id.trim().is_empty() {
                anyhow::bail!("target with empty id");
            }
            if !seen.insert(t.id.as_str()) {
                anyhow::bail!("duplicate target id: {}", t.id);
            }
            if !t.diagnostic && !t.url_template.contains(TargetDescriptor::PLACEHOLDER) {
                anyhow::bail!(
                    "target {} url has no {} placeholder",
                    t.id,
                    TargetDescriptor::PLACEHOLDER
                );
            }
            url::Url::parse(&t.url_for("diag#0"))
                .with_context(|| format!("target {} has an invalid url template", t.id))?;
        }

        // Stable: keeps configured order inside a category.
        targets.sort_by_key(|t| t.category);

        Ok(Self {
            targets,
            diagnostics,
        })
    }

    /// Targets a session in `mode` may fetch, in fetch order.
    ///
    /// Update mode returns the same candidates as Init; staleness filtering
    /// happens against the checkpoint store when the session selects.
    pub fn targets_for_mode(&self, mode: Mode) -> Vec<TargetDescriptor> {
        match mode {
            Mode::Init | Mode::Update => self.targets.clone(),
            Mode::Full => self
                .targets
                .iter()
                .chain(self.diagnostics.iter())
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TargetDescriptor> {
        self.targets
            .iter()
            .chain(self.diagnostics.iter())
            .find(|t| t.id == id)
    }

    /// Number of regular (non-diagnostic) targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn describe(t: &TargetConfig, diagnostic: bool) -> TargetDescriptor {
    TargetDescriptor {
        id: t.id.clone(),
        url_template: t.url.clone(),
        category: t.category,
        staleness: Duration::from_secs(t.staleness_secs),
        format: t.format,
        diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, category: Category) -> TargetDescriptor {
        TargetDescriptor {
            id: id.to_string(),
            url_template: format!("https://api.example.com/{{subject}}/{id}"),
            category,
            staleness: Duration::from_secs(60),
            format: PayloadFormat::Json,
            diagnostic: false,
        }
    }

    #[test]
    fn orders_critical_before_standard_before_casual() {
        let reg = PriorityRegistry::new(
            vec![
                target("loadout", Category::Casual),
                target("history", Category::Standard),
                target("overview", Category::Critical),
                target("premier", Category::Critical),
                target("unrated", Category::Casual),
            ],
            vec![],
        )
        .unwrap();
        let ids: Vec<_> = reg
            .targets_for_mode(Mode::Update)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["overview", "premier", "history", "loadout", "unrated"]);
    }

    #[test]
    fn full_mode_appends_diagnostics() {
        let mut diag = target("site_root", Category::Casual);
        diag.url_template = "https://example.com/".to_string();
        diag.diagnostic = true;
        let reg =
            PriorityRegistry::new(vec![target("overview", Category::Critical)], vec![diag])
                .unwrap();
        assert_eq!(reg.targets_for_mode(Mode::Init).len(), 1);
        let full = reg.targets_for_mode(Mode::Full);
        assert_eq!(full.len(), 2);
        assert!(full[1].diagnostic);
        assert!(reg.get("site_root").is_some());
    }

    #[test]
    fn rejects_duplicate_ids_and_missing_placeholder() {
        let dup = PriorityRegistry::new(
            vec![
                target("overview", Category::Critical),
                target("overview", Category::Casual),
            ],
            vec![],
        );
        assert!(dup.is_err());

        let mut bad = target("overview", Category::Critical);
        bad.url_template = "https://api.example.com/static".to_string();
        assert!(PriorityRegistry::new(vec![bad], vec![]).is_err());
    }

    #[test]
    fn default_config_builds() {
        let reg = PriorityRegistry::from_config(&PipelineConfig::default()).unwrap();
        assert_eq!(reg.len(), 8);
        let first = &reg.targets_for_mode(Mode::Init)[0];
        assert_eq!(first.category, Category::Critical);
        assert_eq!(
            first.url_for("alpha#1"),
            "https://api.tracker.gg/api/v1/valorant/standard/profile/riot/alpha%231/aggregated?playlist=competitive&source=web"
        );
    }
}
