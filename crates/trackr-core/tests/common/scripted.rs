//! Scripted gateway and in-memory sink.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use trackr_core::fetch::Payload;
use trackr_core::gateway::{Gateway, GatewayResponse, SessionHandle, TransportError};
use trackr_core::sink::PayloadSink;

pub type Reply = Result<GatewayResponse, TransportError>;
type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Answers each URL from its queue; the last reply repeats once the queue
/// drains. Unscripted URLs get `fallback`.
pub struct ScriptedGateway {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    latency: Duration,
    requests: Mutex<Vec<String>>,
    sessions_opened: Mutex<usize>,
    sessions_closed: Mutex<usize>,
    hook: Option<Hook>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            fallback: Ok(GatewayResponse::new(200, r#"{"data":{"default":true}}"#)),
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            sessions_opened: Mutex::new(0),
            sessions_closed: Mutex::new(0),
            hook: None,
        }
    }

    /// Real delay per request so concurrent sessions overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Called with the URL before every request is answered.
    pub fn on_request(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn push(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn ok(&self, url: &str, body: &str) {
        self.push(url, Ok(GatewayResponse::new(200, body)));
    }

    pub fn status(&self, url: &str, status: u16) {
        self.push(url, Ok(GatewayResponse::new(status, "")));
    }

    /// Every requested URL, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }

    pub fn sessions(&self) -> (usize, usize) {
        (
            *self.sessions_opened.lock().unwrap(),
            *self.sessions_closed.lock().unwrap(),
        )
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn open_session(
        &self,
        identity: &str,
        proxy: Option<&str>,
    ) -> Result<SessionHandle, TransportError> {
        let mut opened = self.sessions_opened.lock().unwrap();
        *opened += 1;
        Ok(SessionHandle {
            id: Some(format!("s-{opened}")),
            identity: identity.to_string(),
            proxy: proxy.map(str::to_string),
        })
    }

    async fn request(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _session: &SessionHandle,
    ) -> Reply {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(hook) = &self.hook {
            hook(url);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => self.fallback.clone(),
        }
    }

    async fn close_session(&self, _session: &SessionHandle) -> Result<(), TransportError> {
        *self.sessions_closed.lock().unwrap() += 1;
        Ok(())
    }
}

/// Keeps every stored payload in memory.
#[derive(Default)]
pub struct MemorySink {
    stored: Mutex<Vec<(String, String, String)>>,
}

impl MemorySink {
    /// (subject, target, fingerprint) of every stored payload.
    pub fn stored(&self) -> Vec<(String, String, String)> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayloadSink for MemorySink {
    async fn store(
        &self,
        subject: &str,
        target: &str,
        _payload: &Payload,
        fingerprint: &str,
    ) -> Result<()> {
        self.stored.lock().unwrap().push((
            subject.to_string(),
            target.to_string(),
            fingerprint.to_string(),
        ));
        Ok(())
    }
}

