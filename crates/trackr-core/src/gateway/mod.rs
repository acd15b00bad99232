//! Gateway seam: the only path from the pipeline to the target site.
//!
//! A gateway executes a GET for a target URL (typically through a
//! browser-automation service that solves anti-bot challenges) and reports
//! the target site's status code and body. Sessions let one browser context
//! span every request of a pipeline session.

mod flaresolverr;

use async_trait::async_trait;

use crate::retry::{classify_curl_error, ErrorKind};

pub use flaresolverr::FlareSolverrGateway;

/// What the target site answered, as seen through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to get any answer from the target site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("gateway timed out: {0}")]
    Timeout(String),
    #[error("gateway connection failed: {0}")]
    Connection(String),
    #[error("gateway error: {0}")]
    Gateway(String),
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        if e.is_operation_timedout() {
            TransportError::Timeout(e.to_string())
        } else if classify_curl_error(&e) == ErrorKind::Transient {
            TransportError::Connection(e.to_string())
        } else {
            TransportError::Gateway(e.to_string())
        }
    }
}

/// Browser context opened on the gateway for one pipeline session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Gateway-side session id; `None` means every request stands alone.
    pub id: Option<String>,
    pub identity: String,
    pub proxy: Option<String>,
}

impl SessionHandle {
    pub fn sessionless(identity: &str, proxy: Option<&str>) -> Self {
        Self {
            id: None,
            identity: identity.to_string(),
            proxy: proxy.map(str::to_string),
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Open a browser context carrying `identity` through `proxy`.
    async fn open_session(
        &self,
        identity: &str,
        proxy: Option<&str>,
    ) -> Result<SessionHandle, TransportError> {
        Ok(SessionHandle::sessionless(identity, proxy))
    }

    /// GET `url` with `headers` inside `session`.
    async fn request(
        &self,
        url: &str,
        headers: &[(String, String)],
        session: &SessionHandle,
    ) -> Result<GatewayResponse, TransportError>;

    async fn close_session(&self, _session: &SessionHandle) -> Result<(), TransportError> {
        Ok(())
    }

    /// Whether `request` presents its headers, user agent included, to the
    /// site. Browsers that fix the user agent when a session is created
    /// return false; the executor then changes identity by reopening the
    /// session.
    fn per_request_identity(&self) -> bool {
        true
    }
}
