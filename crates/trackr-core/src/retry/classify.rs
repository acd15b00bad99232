//! Classify gateway status codes, curl errors, and challenge pages.

use crate::retry::policy::ErrorKind;

/// Classify a non-2xx HTTP status reported for the target site.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 => ErrorKind::Throttled,
        403 | 503 => ErrorKind::Blocked,
        404 | 410 => ErrorKind::NotFound,
        408 | 500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

/// Classify a curl error from talking to the gateway.
///
/// Timeouts and connection-level failures are worth retrying; anything
/// else (bad URL, TLS setup, etc.) will not improve on its own.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Transient;
    }
    ErrorKind::Fatal
}

const CHALLENGE_MARKERS: &[&str] = &[
    "<title>just a moment...</title>",
    "<title>attention required! | cloudflare</title>",
    "cf-browser-verification",
    "cf_chl_opt",
    "challenge-platform",
    "checking your browser before accessing",
];

/// True when a 200 body is an anti-bot interstitial instead of content.
pub fn looks_like_challenge(body: &str) -> bool {
    // Challenge pages are small; avoid lowercasing large payloads.
    let head: String = body.chars().take(8_192).collect::<String>().to_ascii_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| head.contains(m))
}
