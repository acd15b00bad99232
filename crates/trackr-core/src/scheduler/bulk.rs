//! Bounded parallel bulk run over many subjects.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::control::RunControl;
use crate::registry::Mode;
use crate::session::ModeCoordinator;
use crate::subject::validate_subject;
use crate::summary::{summarize, SessionSummary};

/// Session task that dies with its owner. Dropping the bulk future aborts
/// the outer tasks through the `JoinSet`; this carries that to the inner one.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Keeps `subject` in the running set until dropped.
struct Registration {
    control: Arc<RunControl>,
    subject: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.control.unregister(&self.subject);
    }
}

/// Run `mode` for every subject with up to `max_concurrent` sessions at once.
///
/// Returns one summary per input subject, in input order. Each session is
/// registered with `control` so it can be cancelled individually or as a
/// whole run. Dropping the returned future stops every session it started.
pub async fn run_bulk(
    coordinator: Arc<ModeCoordinator>,
    subjects: &[String],
    mode: Mode,
    max_concurrent: usize,
    control: Arc<RunControl>,
) -> Vec<SessionSummary> {
    let max_concurrent = max_concurrent.max(1);
    let mut results: Vec<Option<SessionSummary>> = vec![None; subjects.len()];
    let mut queue = subjects.iter().enumerate();
    let mut join_set = tokio::task::JoinSet::new();

    tracing::info!(
        subjects = subjects.len(),
        max_concurrent,
        mode = %mode,
        "bulk run started"
    );

    loop {
        while join_set.len() < max_concurrent {
            let Some((index, raw)) = queue.next() else {
                break;
            };
            let subject = match validate_subject(raw) {
                Ok(s) => s,
                Err(e) => {
                    results[index] = Some(SessionSummary::aborted(raw, mode, format!("{e:#}")));
                    continue;
                }
            };
            let coordinator = Arc::clone(&coordinator);
            let control = Arc::clone(&control);
            join_set.spawn(async move {
                let token = control.register(&subject);
                let _registered = Registration {
                    control: Arc::clone(&control),
                    subject: subject.clone(),
                };
                let session_subject = subject.clone();
                // Inner task so a panic is reported as this subject's failure.
                let mut session_task = AbortOnDrop(tokio::spawn(async move {
                    let session = coordinator.run(&session_subject, mode, &token).await;
                    summarize(&session)
                }));
                let summary = match (&mut session_task.0).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        tracing::error!(subject = %subject, "session task failed: {e}");
                        SessionSummary::aborted(&subject, mode, format!("session task failed: {e}"))
                    }
                };
                (index, summary)
            });
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok((index, summary)) => results[index] = Some(summary),
            Err(e) => tracing::error!("bulk task join: {e}"),
        }
    }

    results
        .into_iter()
        .zip(subjects)
        .map(|(summary, subject)| {
            summary.unwrap_or_else(|| {
                SessionSummary::aborted(subject, mode, "session result lost".to_string())
            })
        })
        .collect()
}
