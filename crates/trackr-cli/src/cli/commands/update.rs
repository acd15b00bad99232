//! `trackr update <subject>` – refresh one subject.

use anyhow::Result;
use trackr_core::api::update_subject;
use trackr_core::registry::Mode;
use trackr_core::Pipeline;

pub async fn run_update(pipeline: &Pipeline, subject: &str, mode: Mode) -> Result<()> {
    let response = update_subject(pipeline, subject, mode).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
