//! FlareSolverr-compatible gateway over libcurl.
//!
//! Commands are JSON documents POSTed to `<base>/v1`; the service drives a
//! real browser and returns the page it ended up on. Blocking curl calls run
//! on the blocking pool.
//!
//! FlareSolverr v2+ ignores custom request headers. The user agent is fixed
//! by `sessions.create`, so `request.get` carries only the URL and session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Gateway, GatewayResponse, SessionHandle, TransportError};
use crate::config::GatewayConfig;

/// Extra time on top of the solver's own timeout before we give up on it.
const TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ProxySpec<'a> {
    url: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Command<'a> {
    cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<ProxySpec<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    status: u16,
    #[serde(default)]
    response: String,
}

/// Gateway client for a FlareSolverr service.
#[derive(Debug, Clone)]
pub struct FlareSolverrGateway {
    endpoint: String,
    timeout: Duration,
}

impl FlareSolverrGateway {
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            endpoint: format!("{}/v1", cfg.url.trim_end_matches('/')),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        }
    }

    fn max_timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// `request.get` for `url`. A session already carries its proxy;
    /// sessionless requests name it.
    fn request_command<'a>(&self, url: &'a str, session: &'a SessionHandle) -> Command<'a> {
        let proxy = match session.id {
            Some(_) => None,
            None => session.proxy.as_deref().map(|url| ProxySpec { url }),
        };
        Command {
            cmd: "request.get",
            url: Some(url),
            session: session.id.as_deref(),
            proxy,
            max_timeout: Some(self.max_timeout_ms()),
            ..Command::default()
        }
    }

    async fn send(&self, command: &Command<'_>) -> Result<Reply, TransportError> {
        let body = serde_json::to_vec(command)
            .map_err(|e| TransportError::Gateway(format!("encode command: {e}")))?;
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout + TIMEOUT_SLACK;
        let (code, raw) = tokio::task::spawn_blocking(move || post_json(&endpoint, &body, timeout))
            .await
            .map_err(|e| TransportError::Gateway(format!("gateway task failed: {e}")))??;

        let reply: Reply = serde_json::from_slice(&raw).map_err(|e| {
            TransportError::Gateway(format!("unreadable reply (HTTP {code}): {e}"))
        })?;
        if reply.status != "ok" {
            return Err(classify_failure(&reply.message));
        }
        Ok(reply)
    }
}

/// POST `body` as JSON and return the HTTP code and raw reply. Blocking.
fn post_json(endpoint: &str, body: &[u8], timeout: Duration) -> Result<(u32, Vec<u8>), TransportError> {
    let mut out = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(endpoint)?;
    easy.post(true)?;
    easy.post_fields_copy(body)?;
    easy.connect_timeout(Duration::from_secs(10))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/json")?;
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            out.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok((code, out))
}

/// FlareSolverr reports solver timeouts and browser crashes as `status: error`.
fn classify_failure(message: &str) -> TransportError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TransportError::Timeout(message.to_string())
    } else {
        TransportError::Gateway(message.to_string())
    }
}

#[async_trait]
impl Gateway for FlareSolverrGateway {
    async fn open_session(
        &self,
        identity: &str,
        proxy: Option<&str>,
    ) -> Result<SessionHandle, TransportError> {
        let reply = self
            .send(&Command {
                cmd: "sessions.create",
                user_agent: Some(identity),
                proxy: proxy.map(|url| ProxySpec { url }),
                max_timeout: Some(self.max_timeout_ms()),
                ..Command::default()
            })
            .await?;
        let id = reply
            .session
            .ok_or_else(|| TransportError::Gateway("sessions.create returned no id".into()))?;
        tracing::debug!(session = %id, "gateway session created");
        Ok(SessionHandle {
            id: Some(id),
            identity: identity.to_string(),
            proxy: proxy.map(str::to_string),
        })
    }

    async fn request(
        &self,
        url: &str,
        _headers: &[(String, String)],
        session: &SessionHandle,
    ) -> Result<GatewayResponse, TransportError> {
        let reply = self.send(&self.request_command(url, session)).await?;
        let solution = reply
            .solution
            .ok_or_else(|| TransportError::Gateway("request.get returned no solution".into()))?;
        Ok(GatewayResponse::new(solution.status, solution.response))
    }

    fn per_request_identity(&self) -> bool {
        false
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), TransportError> {
        let Some(id) = session.id.as_deref() else {
            return Ok(());
        };
        self.send(&Command {
            cmd: "sessions.destroy",
            session: Some(id),
            ..Command::default()
        })
        .await?;
        tracing::debug!(session = %id, "gateway session destroyed");
        Ok(())
    }
}
