//! Mode coordinator: drives one subject's session through
//! `Selecting -> Fetching -> Summarizing -> Done`.
//!
//! - Init selects every registry target.
//! - Update selects only stale targets (critical first); none stale goes
//!   straight to `Summarizing` with zero attempts.
//! - Full selects every target plus the diagnostic targets.
//!
//! Targets run one after another in registry order. Cancellation is checked
//! before each target's pacing delay and fetch; a cancelled session still
//! summarizes what completed.

mod locks;
mod state;

use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::clock::Clock;
use crate::control::CancelToken;
use crate::evasion::EvasionController;
use crate::fetch::FetchExecutor;
use crate::gateway::{Gateway, SessionHandle};
use crate::registry::{Mode, PriorityRegistry, TargetDescriptor};
use crate::scheduler::FetchingGauge;

pub use locks::{SubjectGuard, SubjectLocks};
pub use state::{Session, SessionState};

pub struct ModeCoordinator {
    registry: Arc<PriorityRegistry>,
    store: Arc<dyn CheckpointStore>,
    executor: FetchExecutor,
    evasion: EvasionController,
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    locks: SubjectLocks,
    gauge: Arc<FetchingGauge>,
}

impl ModeCoordinator {
    pub fn new(
        registry: Arc<PriorityRegistry>,
        store: Arc<dyn CheckpointStore>,
        executor: FetchExecutor,
        evasion: EvasionController,
        gateway: Arc<dyn Gateway>,
        clock: Arc<dyn Clock>,
        gauge: Arc<FetchingGauge>,
    ) -> Self {
        Self {
            registry,
            store,
            executor,
            evasion,
            gateway,
            clock,
            locks: SubjectLocks::new(),
            gauge,
        }
    }

    pub fn registry(&self) -> &PriorityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn gauge(&self) -> &Arc<FetchingGauge> {
        &self.gauge
    }

    /// Run one session for `subject`. Waits while another session of the
    /// same subject is active.
    pub async fn run(&self, subject: &str, mode: Mode, cancel: &CancelToken) -> Session {
        let _subject_guard = self.locks.acquire(subject).await;
        let mut session = Session::new(subject, mode, self.clock.now_millis());

        session.selected = self.select(subject, mode).await;
        tracing::info!(
            subject,
            mode = %mode,
            selected = session.selected.len(),
            "session selected targets"
        );

        if !session.selected.is_empty() {
            session.enter(SessionState::Fetching);
            self.fetch_all(&mut session, cancel).await;
        }

        session.enter(SessionState::Summarizing);
        session.finished_at = Some(self.clock.now_millis());
        session.enter(SessionState::Done);
        session
    }

    async fn select(&self, subject: &str, mode: Mode) -> Vec<TargetDescriptor> {
        let candidates = self.registry.targets_for_mode(mode);
        if mode != Mode::Update {
            return candidates;
        }
        let now = self.clock.now_millis();
        let mut stale = Vec::with_capacity(candidates.len());
        for target in candidates {
            let is_stale = match self
                .store
                .is_stale(subject, &target.id, target.staleness, now)
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(subject, target = %target.id, "staleness check failed, refetching: {e:#}");
                    true
                }
            };
            if is_stale {
                stale.push(target);
            }
        }
        stale
    }

    async fn fetch_all(&self, session: &mut Session, cancel: &CancelToken) {
        let _fetching = self.gauge.enter();
        let subject = session.subject.clone();

        let mut evasion = self.evasion.begin_session(&subject);
        session.proxy = evasion.proxy().map(str::to_string);
        session.previous_identity = evasion.previous_identity().map(str::to_string);

        let identity = evasion.session_identity();
        let mut handle = match self
            .gateway
            .open_session(&identity, evasion.proxy())
            .await
        {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(subject = %subject, "gateway session unavailable, continuing without: {e}");
                SessionHandle::sessionless(&identity, evasion.proxy())
            }
        };

        for target in session.selected.clone() {
            if cancel.is_cancelled() {
                tracing::info!(
                    subject = %subject,
                    done = session.attempts.len(),
                    remaining = session.selected.len() - session.attempts.len(),
                    "session cancelled"
                );
                session.cancelled = true;
                break;
            }
            let attempt = self
                .executor
                .fetch(&subject, &target, &mut evasion, &mut handle)
                .await;
            session.attempts.push(attempt);
        }

        if let Err(e) = self.gateway.close_session(&handle).await {
            tracing::warn!(subject = %subject, "closing gateway session failed: {e}");
        }
    }
}
