//! Fetch executor: one target, with pacing, retry/backoff and checkpointing.
//!
//! Every call ends in a terminal [`FetchAttempt`]; failures are values, never
//! errors. Each try asks the session's evasion state for a fresh profile and
//! awaits its pacing delay before the request. Against a gateway that fixes
//! the identity per session, the first try keeps the session's identity and
//! each retry reopens the session under the newly drawn one.
//!
//! Retryable outcomes (soft block, rate limit, transient) back off per the
//! [`RetryPolicy`]; not found and fatal outcomes stop immediately. Once the outcome is settled the
//! changed payload goes to the sink and the checkpoint is written once.

mod normalize;
mod outcome;


use std::sync::Arc;
use std::time::Duration;

use crate::checkpoint::CheckpointStore;
use crate::clock::{Clock, Sleeper};
use crate::evasion::{request_headers, EvasionProfile, SessionEvasion};
use crate::gateway::{Gateway, SessionHandle};
use crate::registry::{Category, TargetDescriptor};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::sink::PayloadSink;

pub use normalize::{extract_json, normalize};
pub use outcome::{Outcome, OutcomeKind, Payload};

/// Immutable record of one target fetch after retries resolved.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub target: String,
    pub category: Category,
    pub diagnostic: bool,
    /// Unix millis when the first try began.
    pub started_at: i64,
    pub outcome: Outcome,
    /// Time from the first try to the settled outcome, pacing and backoff included.
    pub latency: Duration,
    /// Profile of the final try.
    pub profile: EvasionProfile,
    /// Tries beyond the first.
    pub retries: u32,
    /// Identity presented by every try, in order.
    pub identities: Vec<String>,
    /// Sum of pacing delays awaited before tries.
    pub paced: Duration,
    /// Backoff delays awaited between tries.
    pub backoffs: Vec<Duration>,
}

impl FetchAttempt {
    pub fn tries(&self) -> u32 {
        self.retries + 1
    }
}

pub struct FetchExecutor {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn CheckpointStore>,
    sink: Arc<dyn PayloadSink>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    referer_template: String,
}

impl FetchExecutor {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn CheckpointStore>,
        sink: Arc<dyn PayloadSink>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        referer_template: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            sink,
            policy,
            clock,
            sleeper,
            referer_template: referer_template.into(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `target` for `subject` inside the gateway `session`.
    pub async fn fetch(
        &self,
        subject: &str,
        target: &TargetDescriptor,
        evasion: &mut SessionEvasion,
        session: &mut SessionHandle,
    ) -> FetchAttempt {
        let prior = match self.store.get(subject, &target.id).await {
            Ok(cp) => cp.and_then(|cp| cp.fingerprint),
            Err(e) => {
                tracing::warn!(subject, target = %target.id, "checkpoint read failed: {e:#}");
                None
            }
        };

        let url = target.url_for(subject);
        let started_at = self.clock.now_millis();
        let mut identities = Vec::new();
        let mut backoffs = Vec::new();
        let mut paced = Duration::ZERO;
        let mut attempt = 1u32;

        let per_request = self.gateway.per_request_identity();
        let (mut outcome, profile) = loop {
            let profile = if per_request || attempt > 1 {
                evasion.next_profile()
            } else {
                evasion.pacing_profile(&session.identity)
            };
            identities.push(profile.identity.clone());
            if !profile.delay.is_zero() {
                paced += profile.delay;
                self.sleeper.sleep(profile.delay).await;
            }
            if !per_request && profile.identity != session.identity {
                self.reopen_session(subject, session, &profile).await;
            }

            let headers = request_headers(
                target.format,
                subject,
                &profile.identity,
                &self.referer_template,
            );
            let outcome = match self.gateway.request(&url, &headers, &*session).await {
                Ok(resp) => normalize(target.format, &resp, prior.as_deref()),
                Err(e) => Outcome::Transient(e.to_string()),
            };
            tracing::debug!(
                subject,
                target = %target.id,
                attempt,
                outcome = outcome.kind().as_str(),
                "fetch try finished"
            );

            let Some(kind) = outcome.error_kind() else {
                break (outcome, profile);
            };
            match self.policy.decide(attempt, kind) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::info!(
                        subject,
                        target = %target.id,
                        attempt,
                        outcome = outcome.kind().as_str(),
                        backoff_ms = delay.as_millis() as u64,
                        "retrying with fresh profile"
                    );
                    backoffs.push(delay);
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::NoRetry => {
                    if kind.is_retryable() {
                        tracing::warn!(
                            subject,
                            target = %target.id,
                            tries = attempt,
                            outcome = outcome.kind().as_str(),
                            "retries exhausted"
                        );
                    }
                    break (outcome, profile);
                }
            }
        };

        let sink_error = match &outcome {
            Outcome::Success {
                payload,
                fingerprint,
            } if !target.diagnostic => self
                .sink
                .store(subject, &target.id, payload, fingerprint)
                .await
                .err(),
            _ => None,
        };
        if let Some(e) = sink_error {
            outcome = Outcome::Fatal(format!("payload sink: {e:#}"));
        }
        if let Outcome::Fatal(cause) = &outcome {
            tracing::warn!(subject, target = %target.id, "fatal outcome: {cause}");
        }

        let finished_at = self.clock.now_millis();
        if let Err(e) = self
            .store
            .record_attempt(
                subject,
                &target.id,
                &outcome.checkpoint_update(),
                finished_at,
            )
            .await
        {
            tracing::warn!(subject, target = %target.id, "checkpoint write failed: {e:#}");
        }

        FetchAttempt {
            target: target.id.clone(),
            category: target.category,
            diagnostic: target.diagnostic,
            started_at,
            outcome,
            latency: Duration::from_millis(finished_at.saturating_sub(started_at).max(0) as u64),
            profile,
            retries: attempt - 1,
            identities,
            paced,
            backoffs,
        }
    }

    /// Replace `session` with a gateway session presenting `profile`'s identity.
    async fn reopen_session(
        &self,
        subject: &str,
        session: &mut SessionHandle,
        profile: &EvasionProfile,
    ) {
        if let Err(e) = self.gateway.close_session(session).await {
            tracing::warn!(subject, "closing gateway session failed: {e}");
        }
        let proxy = profile.proxy.as_deref();
        *session = match self.gateway.open_session(&profile.identity, proxy).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(subject, "reopening gateway session failed, continuing without: {e}");
                SessionHandle::sessionless(&profile.identity, proxy)
            }
        };
        tracing::debug!(subject, "gateway session reopened under a new identity");
    }
}
