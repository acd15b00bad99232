//! Shared fixtures for pipeline integration tests: a scripted gateway, an
//! in-memory payload sink, and a pipeline wired to both.

#![allow(dead_code)]

pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use trackr_core::checkpoint::SqliteCheckpointStore;
use trackr_core::clock::{ManualClock, RecordingSleeper};
use trackr_core::config::{PipelineConfig, TargetConfig};
use trackr_core::registry::{Category, PayloadFormat};
use trackr_core::Pipeline;

pub use scripted::{MemorySink, ScriptedGateway};

pub const HOUR: u64 = 60 * 60;

/// Target table entry under the test API host.
pub fn target(id: &str, category: Category, staleness_secs: u64) -> TargetConfig {
    TargetConfig {
        id: id.to_string(),
        url: format!("https://api.test/{{subject}}/{id}"),
        category,
        staleness_secs,
        format: PayloadFormat::Json,
    }
}

/// Concrete URL the pipeline requests for `subject` and `target`.
pub fn url(subject: &str, target: &str) -> String {
    format!("https://api.test/{}/{target}", subject.replace('#', "%23"))
}

/// Config with no pacing delay and a small backoff curve (10, 20, 40 ms).
pub fn config(targets: Vec<TargetConfig>) -> PipelineConfig {
    PipelineConfig {
        base_delay_ms: 10,
        max_delay_ms: 40,
        max_retries: 3,
        min_delay_ms: 0,
        max_delay_range_ms: 0,
        default_max_concurrent: 3,
        identities: vec!["ua-0".into(), "ua-1".into(), "ua-2".into()],
        targets,
        diagnostics: Vec::new(),
        ..PipelineConfig::default()
    }
}

pub struct Fixture {
    pub pipeline: Pipeline,
    pub gateway: Arc<ScriptedGateway>,
    pub sink: Arc<MemorySink>,
    pub store: Arc<SqliteCheckpointStore>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub async fn fixture(cfg: PipelineConfig) -> Fixture {
    fixture_with(cfg, ScriptedGateway::new()).await
}

pub async fn fixture_with(cfg: PipelineConfig, gateway: ScriptedGateway) -> Fixture {
    let gateway = Arc::new(gateway);
    let sink = Arc::new(MemorySink::default());
    let store = Arc::new(SqliteCheckpointStore::open_in_memory().await.unwrap());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let sleeper = Arc::new(RecordingSleeper::new());
    let pipeline = Pipeline::builder(cfg)
        .gateway(gateway.clone())
        .store(store.clone())
        .sink(sink.clone())
        .clock(clock.clone())
        .sleeper(sleeper.clone())
        .seed(42)
        .build()
        .unwrap();
    Fixture {
        pipeline,
        gateway,
        sink,
        store,
        clock,
        sleeper,
    }
}

pub fn hours(h: u64) -> Duration {
    Duration::from_secs(h * HOUR)
}
