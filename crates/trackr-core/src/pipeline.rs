//! Pipeline assembly: wires registry, store, gateway, evasion and executor
//! into a mode coordinator that the API and CLI drive.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::clock::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::config::PipelineConfig;
use crate::control::{CancelToken, RunControl};
use crate::evasion::EvasionController;
use crate::fetch::FetchExecutor;
use crate::gateway::Gateway;
use crate::registry::{Mode, PriorityRegistry};
use crate::retry::RetryPolicy;
use crate::scheduler::{run_bulk, FetchingGauge};
use crate::session::{ModeCoordinator, Session};
use crate::sink::PayloadSink;
use crate::summary::{summarize, SessionSummary};

/// Cheap-to-clone handle to a fully wired pipeline.
#[derive(Clone)]
pub struct Pipeline {
    coordinator: Arc<ModeCoordinator>,
    default_max_concurrent: usize,
}

impl Pipeline {
    pub fn builder(cfg: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(cfg)
    }

    pub fn registry(&self) -> &PriorityRegistry {
        self.coordinator.registry()
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        self.coordinator.store()
    }

    pub fn gauge(&self) -> &Arc<FetchingGauge> {
        self.coordinator.gauge()
    }

    pub fn default_max_concurrent(&self) -> usize {
        self.default_max_concurrent
    }

    /// Run one session and return the raw session record.
    pub async fn run_session(&self, subject: &str, mode: Mode, cancel: &CancelToken) -> Session {
        self.coordinator.run(subject, mode, cancel).await
    }

    /// Run one session and summarize it.
    pub async fn update(&self, subject: &str, mode: Mode, cancel: &CancelToken) -> SessionSummary {
        let session = self.run_session(subject, mode, cancel).await;
        let summary = summarize(&session);
        tracing::info!(
            subject,
            mode = %mode,
            status = summary.checkpoint_status.as_str(),
            successful = summary.successful,
            total = summary.total_endpoints,
            "session finished"
        );
        summary
    }

    /// Bulk run over `subjects`. `max_concurrent` falls back to the configured default.
    pub async fn run_bulk(
        &self,
        subjects: &[String],
        mode: Mode,
        max_concurrent: Option<usize>,
        control: Arc<RunControl>,
    ) -> Vec<SessionSummary> {
        let limit = max_concurrent.unwrap_or(self.default_max_concurrent);
        run_bulk(
            Arc::clone(&self.coordinator),
            subjects,
            mode,
            limit,
            control,
        )
        .await
    }
}

/// Collects the collaborators a [`Pipeline`] needs. Gateway, checkpoint store
/// and payload sink are required; clock, sleeper and RNG seed default to the
/// real ones.
pub struct PipelineBuilder {
    cfg: PipelineConfig,
    gateway: Option<Arc<dyn Gateway>>,
    store: Option<Arc<dyn CheckpointStore>>,
    sink: Option<Arc<dyn PayloadSink>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    seed: Option<u64>,
}

impl PipelineBuilder {
    pub fn new(cfg: PipelineConfig) -> Self {
        Self {
            cfg,
            gateway: None,
            store: None,
            sink: None,
            clock: None,
            sleeper: None,
            seed: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PayloadSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Seed identity and delay selection for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let cfg = self.cfg;
        cfg.validate()?;
        let registry = Arc::new(PriorityRegistry::from_config(&cfg).context("target registry")?);
        let gateway = self.gateway.context("pipeline needs a gateway")?;
        let store = self.store.context("pipeline needs a checkpoint store")?;
        let sink = self.sink.context("pipeline needs a payload sink")?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let sleeper = self
            .sleeper
            .unwrap_or_else(|| Arc::new(TokioSleeper) as Arc<dyn Sleeper>);

        let evasion = match self.seed {
            Some(seed) => EvasionController::with_seed(
                cfg.identities.clone(),
                cfg.proxies.clone(),
                cfg.min_delay(),
                cfg.max_delay_range(),
                seed,
            ),
            None => EvasionController::from_config(&cfg),
        };
        let executor = FetchExecutor::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            sink,
            RetryPolicy::from_config(&cfg),
            Arc::clone(&clock),
            sleeper,
            cfg.gateway.referer_template.clone(),
        );
        let coordinator = ModeCoordinator::new(
            registry,
            store,
            executor,
            evasion,
            gateway,
            clock,
            Arc::new(FetchingGauge::new()),
        );

        Ok(Pipeline {
            coordinator: Arc::new(coordinator),
            default_max_concurrent: cfg.default_max_concurrent,
        })
    }
}
