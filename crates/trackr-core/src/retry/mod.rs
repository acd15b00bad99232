//! Retry and backoff policy.
//!
//! This module classifies gateway responses (throttling, soft blocks,
//! network failures, missing resources) and makes exponential backoff
//! decisions so the fetch executor applies one consistent policy.

mod classify;
mod policy;

pub use classify::{classify_curl_error, classify_http_status, looks_like_challenge};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
