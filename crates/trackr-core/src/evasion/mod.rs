//! Evasion controller: identity, pacing delay and proxy per request.
//!
//! The controller is shared by every session of a pipeline. It remembers the
//! last identity handed out per subject (so a subject never sees the same
//! identity twice in a row, even across sessions) and rotates proxies
//! round-robin between sessions. Everything else lives in the per-session
//! [`SessionEvasion`], which no other session touches.

mod headers;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::PipelineConfig;

pub use headers::request_headers;

/// Ephemeral request disguise: who we claim to be, how long to wait first,
/// and which proxy carries the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvasionProfile {
    pub identity: String,
    /// Pacing delay the caller awaits before issuing the request.
    pub delay: Duration,
    pub proxy: Option<String>,
}

/// Shared evasion state for all sessions of one pipeline.
#[derive(Debug)]
pub struct EvasionController {
    identities: Vec<String>,
    proxies: Vec<String>,
    min_delay: Duration,
    max_delay: Duration,
    next_proxy: AtomicUsize,
    last_identity: Arc<Mutex<HashMap<String, usize>>>,
    rng: Mutex<StdRng>,
}

impl EvasionController {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(
            cfg.identities.clone(),
            cfg.proxies.clone(),
            cfg.min_delay(),
            cfg.max_delay_range(),
        )
    }

    pub fn new(
        identities: Vec<String>,
        proxies: Vec<String>,
        min_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self::build(identities, proxies, min_delay, max_delay, StdRng::from_entropy())
    }

    /// Deterministic controller for tests and reproducible runs.
    pub fn with_seed(
        identities: Vec<String>,
        proxies: Vec<String>,
        min_delay: Duration,
        max_delay: Duration,
        seed: u64,
    ) -> Self {
        Self::build(
            identities,
            proxies,
            min_delay,
            max_delay,
            StdRng::seed_from_u64(seed),
        )
    }

    fn build(
        identities: Vec<String>,
        proxies: Vec<String>,
        min_delay: Duration,
        max_delay: Duration,
        rng: StdRng,
    ) -> Self {
        let mut identities: Vec<String> = identities
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .collect();
        if identities.is_empty() {
            identities = PipelineConfig::default().identities;
        }
        Self {
            identities,
            proxies,
            min_delay,
            max_delay: max_delay.max(min_delay),
            next_proxy: AtomicUsize::new(0),
            last_identity: Arc::new(Mutex::new(HashMap::new())),
            rng: Mutex::new(rng),
        }
    }

    /// Start the evasion state for one session of `subject`. Picks the sticky proxy.
    pub fn begin_session(&self, subject: &str) -> SessionEvasion {
        let proxy = if self.proxies.is_empty() {
            None
        } else {
            let i = self.next_proxy.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
            Some(self.proxies[i].clone())
        };
        let seed = self.rng.lock().unwrap_or_else(|p| p.into_inner()).gen::<u64>();
        let previous = self
            .last_identity
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(subject)
            .map(|&i| self.identities[i].clone());
        tracing::debug!(subject, proxy = proxy.as_deref().unwrap_or("direct"), "evasion session started");
        SessionEvasion {
            subject: subject.to_string(),
            identities: self.identities.clone(),
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            proxy,
            previous_identity: previous,
            last_identity: Arc::clone(&self.last_identity),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }
}

/// Evasion state private to one session.
#[derive(Debug)]
pub struct SessionEvasion {
    subject: String,
    identities: Vec<String>,
    min_delay: Duration,
    max_delay: Duration,
    proxy: Option<String>,
    previous_identity: Option<String>,
    last_identity: Arc<Mutex<HashMap<String, usize>>>,
    rng: StdRng,
}

impl SessionEvasion {
    /// Fresh profile for the next request (first try or retry).
    pub fn next_profile(&mut self) -> EvasionProfile {
        let identity = self.draw_identity();
        let delay = self.draw_delay();
        EvasionProfile {
            identity,
            delay,
            proxy: self.proxy.clone(),
        }
    }

    /// Profile that keeps `identity` and only draws a pacing delay. Used for
    /// the first try against a gateway whose identity is fixed per session.
    pub fn pacing_profile(&mut self, identity: &str) -> EvasionProfile {
        EvasionProfile {
            identity: identity.to_string(),
            delay: self.draw_delay(),
            proxy: self.proxy.clone(),
        }
    }

    /// Identity for opening the gateway's browser session. Counts as a draw.
    pub fn session_identity(&mut self) -> String {
        self.draw_identity()
    }

    /// Proxy held for the whole session.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Identity the subject last used before this session began.
    pub fn previous_identity(&self) -> Option<&str> {
        self.previous_identity.as_deref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    fn draw_identity(&mut self) -> String {
        let mut last = self
            .last_identity
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        let n = self.identities.len();
        let idx = match last.get(&self.subject) {
            // Skip over the previous index: uniform over the other n - 1.
            Some(&prev) if n > 1 => {
                let i = self.rng.gen_range(0..n - 1);
                if i >= prev {
                    i + 1
                } else {
                    i
                }
            }
            _ => self.rng.gen_range(0..n),
        };
        last.insert(self.subject.clone(), idx);
        self.identities[idx].clone()
    }

    fn draw_delay(&mut self) -> Duration {
        let lo = self.min_delay.as_millis() as u64;
        let hi = self.max_delay.as_millis() as u64;
        if lo >= hi {
            return self.min_delay;
        }
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }
}
