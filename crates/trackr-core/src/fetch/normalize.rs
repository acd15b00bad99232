//! Turn a gateway response into an [`Outcome`].
//!
//! The browser gateway renders JSON API responses as an HTML page with the
//! document inside `<pre>`; the JSON is recovered before fingerprinting.

use serde_json::Value;

use super::outcome::{Outcome, Payload};
use crate::gateway::GatewayResponse;
use crate::registry::PayloadFormat;
use crate::retry::{classify_http_status, looks_like_challenge, ErrorKind};

/// Classify `response` for a target of `format`. `prior` is the stored
/// fingerprint; an identical payload yields `Unchanged`.
pub fn normalize(format: PayloadFormat, response: &GatewayResponse, prior: Option<&str>) -> Outcome {
    if !response.is_success() {
        return match classify_http_status(response.status) {
            ErrorKind::Throttled => Outcome::RateLimited,
            ErrorKind::Blocked => Outcome::SoftBlocked,
            ErrorKind::NotFound => Outcome::NotFound,
            ErrorKind::Transient => Outcome::Transient(format!("HTTP {}", response.status)),
            ErrorKind::Fatal => Outcome::Fatal(format!("unexpected HTTP {}", response.status)),
        };
    }
    if looks_like_challenge(&response.body) {
        return Outcome::SoftBlocked;
    }

    let payload = match format {
        PayloadFormat::Json => match extract_json(&response.body) {
            Some(value) => {
                if let Some(outcome) = api_error(&value) {
                    return outcome;
                }
                Payload::Json(value)
            }
            None => return Outcome::Fatal("response is not valid JSON".into()),
        },
        PayloadFormat::Html => {
            if response.body.trim().is_empty() {
                return Outcome::Fatal("empty page".into());
            }
            Payload::Html(response.body.clone())
        }
    };

    let fingerprint = payload.fingerprint();
    if prior == Some(fingerprint.as_str()) {
        Outcome::Unchanged { fingerprint }
    } else {
        Outcome::Success {
            payload,
            fingerprint,
        }
    }
}

/// Recover a JSON document from a raw or browser-wrapped body.
///
/// Tries, in order: the contents of the first `<pre>` element, the whole
/// body, and last the span from the first `{` to the last `}`. The whole body
/// goes before the brace span so a top-level array is never cut down to its
/// first object.
pub fn extract_json(body: &str) -> Option<Value> {
    if let Some(inner) = pre_contents(body) {
        if let Ok(v) = serde_json::from_str(unescape_html(inner).trim()) {
            return Some(v);
        }
    }
    if let Ok(v) = serde_json::from_str(body.trim()) {
        return Some(v);
    }
    let (start, end) = (body.find('{')?, body.rfind('}')?);
    if start < end {
        serde_json::from_str(&body[start..=end]).ok()
    } else {
        None
    }
}

fn pre_contents(body: &str) -> Option<&str> {
    let open = body.find("<pre")?;
    let content_start = open + body[open..].find('>')? + 1;
    let content_end = content_start + body[content_start..].find("</pre>")?;
    Some(&body[content_start..content_end])
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// The tracker API answers 200 with an `errors` array for unknown profiles.
fn api_error(value: &Value) -> Option<Outcome> {
    let errors = value.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let has_data = value.get("data").is_some_and(|d| !d.is_null());
    if has_data {
        return None;
    }
    let not_found = errors.iter().any(|e| {
        let code = e.get("code").and_then(Value::as_str).unwrap_or_default();
        let message = e.get("message").and_then(Value::as_str).unwrap_or_default();
        code.contains("NotFound") || message.to_ascii_lowercase().contains("not found")
    });
    if not_found {
        Some(Outcome::NotFound)
    } else {
        let first = errors[0]
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        Some(Outcome::Fatal(format!("api error: {first}")))
    }
}
