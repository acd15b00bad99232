use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::{default_diagnostics, default_targets, Category, PayloadFormat};
use crate::subject::{parse_subject_list, SUBJECTS_ENV};

/// One `[[targets]]` / `[[diagnostics]]` table in config.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Stable identifier used as the checkpoint key.
    pub id: String,
    /// URL template; `{subject}` is replaced by the encoded subject.
    pub url: String,
    #[serde(default = "default_category")]
    pub category: Category,
    /// Maximum age of a successful fetch before Update mode refetches it.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    #[serde(default)]
    pub format: PayloadFormat,
}

fn default_category() -> Category {
    Category::Standard
}

fn default_staleness_secs() -> u64 {
    60 * 60
}

/// Browser-automation gateway (FlareSolverr-compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway; commands are POSTed to `<url>/v1`.
    pub url: String,
    /// Per-request timeout in seconds (also sent as the gateway's maxTimeout).
    pub timeout_secs: u64,
    /// Referer sent with target requests; `{subject}` is substituted.
    pub referer_template: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8191".to_string(),
            timeout_secs: 60,
            referer_template: "https://tracker.gg/valorant/profile/riot/{subject}/overview"
                .to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/trackr/config.toml`.
///
/// Plain values come first so the TOML serializer emits them before tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// First retry backoff in milliseconds; doubles per retry.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Retries after the first attempt for blocked/throttled/transient outcomes.
    pub max_retries: u32,
    /// Lower bound of the pacing delay awaited before every request.
    pub min_delay_ms: u64,
    /// Upper bound of the pacing delay awaited before every request.
    pub max_delay_range_ms: u64,
    /// Sessions run at once by a bulk run when the caller gives no limit.
    pub default_max_concurrent: usize,
    /// Identity (user agent) pool rotated per request.
    pub identities: Vec<String>,
    /// Proxy pool; one proxy is held for a whole session. Empty = direct.
    pub proxies: Vec<String>,
    /// Subjects refreshed by `trackr bulk` with no explicit list.
    pub tracked_subjects: Vec<String>,
    /// Directory for fetched payloads; defaults to the XDG data dir.
    pub payload_dir: Option<PathBuf>,
    pub gateway: GatewayConfig,
    pub targets: Vec<TargetConfig>,
    pub diagnostics: Vec<TargetConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_retries: 3,
            min_delay_ms: 1_000,
            max_delay_range_ms: 3_000,
            default_max_concurrent: 3,
            identities: default_identities(),
            proxies: Vec::new(),
            tracked_subjects: Vec::new(),
            payload_dir: None,
            gateway: GatewayConfig::default(),
            targets: default_targets(),
            diagnostics: default_diagnostics(),
        }
    }
}

fn default_identities() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl PipelineConfig {
    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_range_ms {
            anyhow::bail!(
                "min_delay_ms ({}) is greater than max_delay_range_ms ({})",
                self.min_delay_ms,
                self.max_delay_range_ms
            );
        }
        if self.base_delay_ms > self.max_delay_ms {
            anyhow::bail!(
                "base_delay_ms ({}) is greater than max_delay_ms ({})",
                self.base_delay_ms,
                self.max_delay_ms
            );
        }
        if self.identities.iter().all(|i| i.trim().is_empty()) {
            anyhow::bail!("at least one identity is required");
        }
        if self.default_max_concurrent == 0 {
            anyhow::bail!("default_max_concurrent must be at least 1");
        }
        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay_range(&self) -> Duration {
        Duration::from_millis(self.max_delay_range_ms)
    }

    /// Tracked subjects, with `TRACKR_SUBJECTS` taking precedence over the file.
    pub fn tracked_subjects(&self) -> Vec<String> {
        match std::env::var(SUBJECTS_ENV) {
            Ok(raw) if !raw.trim().is_empty() => {
                let subjects = parse_subject_list(&raw);
                tracing::info!(
                    "loaded {} subject(s) from {}",
                    subjects.len(),
                    SUBJECTS_ENV
                );
                subjects
            }
            _ => self.tracked_subjects.clone(),
        }
    }

    /// Payload directory from config, else `~/.local/share/trackr/payloads`.
    pub fn payload_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.payload_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("trackr")?;
        Ok(xdg_dirs.get_data_home().join("payloads"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trackr")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PipelineConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let default_cfg = PipelineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.base_delay_ms, 1_000);
        assert_eq!(cfg.max_delay_ms, 30_000);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.min_delay_ms, 1_000);
        assert_eq!(cfg.max_delay_range_ms, 3_000);
        assert_eq!(cfg.default_max_concurrent, 3);
        assert_eq!(cfg.targets.len(), 8);
        cfg.validate().unwrap();
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = PipelineConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_retries, cfg.max_retries);
        assert_eq!(parsed.identities, cfg.identities);
        assert_eq!(parsed.targets, cfg.targets);
        assert_eq!(parsed.diagnostics, cfg.diagnostics);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            base_delay_ms = 250
            max_delay_ms = 4000
            max_retries = 5
            min_delay_ms = 0
            max_delay_range_ms = 10
            default_max_concurrent = 2
            identities = ["ua-one", "ua-two"]
            proxies = ["http://10.0.0.1:3128"]

            [gateway]
            url = "http://solver:8191"

            [[targets]]
            id = "overview"
            url = "https://api.example.com/{subject}/overview"
            category = "critical"
            staleness_secs = 120

            [[targets]]
            id = "history"
            url = "https://api.example.com/{subject}/history"
        "#;
        let cfg: PipelineConfig = toml::from_str(toml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.base_delay_ms, 250);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.proxies, vec!["http://10.0.0.1:3128"]);
        assert_eq!(cfg.gateway.url, "http://solver:8191");
        assert_eq!(cfg.gateway.timeout_secs, 60);
        assert_eq!(cfg.targets.len(), 2);
        assert_eq!(cfg.targets[0].category, Category::Critical);
        assert_eq!(cfg.targets[1].category, Category::Standard);
        assert_eq!(cfg.targets[1].staleness_secs, 3600);
        assert_eq!(cfg.targets[1].format, PayloadFormat::Json);
        // Sections not mentioned keep their defaults.
        assert_eq!(cfg.diagnostics.len(), 2);
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        let mut cfg = PipelineConfig::default();
        cfg.min_delay_ms = 5_000;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.base_delay_ms = 60_000;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.identities = vec![" ".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_or_init_creates_then_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let created = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        let loaded = load_or_init_at(&path).unwrap();
        assert_eq!(loaded.max_retries, created.max_retries);
        assert_eq!(loaded.targets.len(), created.targets.len());
    }
}
