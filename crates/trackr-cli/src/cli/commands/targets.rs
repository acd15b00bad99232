//! `trackr targets` – list registry targets in fetch order.

use anyhow::Result;
use trackr_core::config::PipelineConfig;
use trackr_core::registry::{Mode, PriorityRegistry};

pub fn run_targets(cfg: &PipelineConfig, mode: Mode) -> Result<()> {
    let registry = PriorityRegistry::from_config(cfg)?;
    println!("{:<28} {:<9} {:>10} {}", "ID", "CATEGORY", "STALENESS", "URL");
    for t in registry.targets_for_mode(mode) {
        let category = if t.diagnostic {
            "diag"
        } else {
            t.category.as_str()
        };
        println!(
            "{:<28} {:<9} {:>10} {}",
            t.id,
            category,
            format!("{}s", t.staleness.as_secs()),
            t.url_template
        );
    }
    Ok(())
}
