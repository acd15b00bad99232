//! Concurrency scheduler for bulk runs.
//!
//! Runs one session per subject with at most `max_concurrent` sessions in
//! flight; as one finishes the next queued subject starts. A failing or
//! panicking session only affects its own summary.

mod bulk;
mod gauge;

pub use bulk::run_bulk;
pub use gauge::{FetchingGauge, FetchingGuard};
