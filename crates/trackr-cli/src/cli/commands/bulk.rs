//! `trackr bulk` – refresh many subjects; cancellable through the control socket.

use anyhow::Result;
use std::sync::Arc;
use trackr_core::api::UpdateResponse;
use trackr_core::control::RunControl;
use trackr_core::registry::Mode;
use trackr_core::Pipeline;

use crate::cli::control_socket;

pub async fn run_bulk(
    pipeline: &Pipeline,
    subjects: &[String],
    mode: Mode,
    max_concurrent: Option<usize>,
) -> Result<()> {
    if subjects.is_empty() {
        println!("No subjects given and none tracked.");
        return Ok(());
    }

    let control = Arc::new(RunControl::new());
    let listener = match trackr_core::control::default_control_socket_path() {
        Ok(path) => match control_socket::spawn_control_listener(Arc::clone(&control), &path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some((handle, path))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket unavailable: {:#}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("no control socket path: {}", e);
            None
        }
    };

    let summaries = pipeline
        .run_bulk(subjects, mode, max_concurrent, Arc::clone(&control))
        .await;

    if let Some((handle, path)) = listener {
        handle.abort();
        let _ = std::fs::remove_file(&path);
    }

    let responses: Vec<UpdateResponse> = summaries.iter().map(UpdateResponse::from).collect();
    println!("{}", serde_json::to_string_pretty(&responses)?);

    let clean = summaries.iter().filter(|s| s.is_clean()).count();
    tracing::info!(
        subjects = summaries.len(),
        clean,
        peak_fetching = pipeline.gauge().peak(),
        "bulk run completed"
    );
    Ok(())
}
