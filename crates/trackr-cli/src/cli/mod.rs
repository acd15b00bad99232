//! CLI for the trackr player-stats refresher.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use trackr_core::checkpoint::SqliteCheckpointStore;
use trackr_core::config::{self, PipelineConfig};
use trackr_core::gateway::FlareSolverrGateway;
use trackr_core::registry::Mode;
use trackr_core::sink::JsonFileSink;
use trackr_core::Pipeline;

use commands::{run_bulk, run_cancel, run_status, run_targets, run_update};

/// Top-level CLI for trackr.
#[derive(Debug, Parser)]
#[command(name = "trackr")]
#[command(about = "trackr: refresh player stats through a browser gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Refresh one subject and print the result as JSON.
    Update {
        /// Player identity, e.g. `name#tag`.
        subject: String,
        /// init (every target), update (stale targets only) or full (plus diagnostics).
        #[arg(long, default_value = "update")]
        mode: Mode,
    },

    /// Refresh many subjects in parallel. Defaults to the tracked subjects.
    Bulk {
        /// Subjects to refresh; empty = `tracked_subjects` / TRACKR_SUBJECTS.
        subjects: Vec<String>,
        /// Sessions run at once (default from config).
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,
        #[arg(long, default_value = "update")]
        mode: Mode,
    },

    /// Show checkpoints for a subject, or every known subject.
    Status {
        subject: Option<String>,
    },

    /// List the targets a session in `mode` would consider, in fetch order.
    Targets {
        #[arg(long, default_value = "init")]
        mode: Mode,
    },

    /// Cancel a subject's session in a running `trackr bulk`.
    Cancel {
        /// Subject to cancel.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        subject: Option<String>,
        /// Cancel every session of the run.
        #[arg(long)]
        all: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Update { subject, mode } => {
                let pipeline = build_pipeline(&cfg).await?;
                run_update(&pipeline, &subject, mode).await?;
            }
            CliCommand::Bulk {
                subjects,
                max_concurrent,
                mode,
            } => {
                let pipeline = build_pipeline(&cfg).await?;
                let subjects = if subjects.is_empty() {
                    cfg.tracked_subjects()
                } else {
                    subjects
                };
                run_bulk(&pipeline, &subjects, mode, max_concurrent).await?;
            }
            CliCommand::Status { subject } => {
                let store = SqliteCheckpointStore::open_default().await?;
                run_status(&store, &cfg, subject.as_deref()).await?;
            }
            CliCommand::Targets { mode } => run_targets(&cfg, mode)?,
            CliCommand::Cancel { subject, all } => run_cancel(subject.as_deref(), all).await?,
        }

        Ok(())
    }
}

/// Pipeline wired to the configured gateway, the default checkpoint DB and
/// the JSON payload directory.
async fn build_pipeline(cfg: &PipelineConfig) -> Result<Pipeline> {
    let store = SqliteCheckpointStore::open_default().await?;
    let payload_dir = cfg.payload_dir()?;
    tracing::debug!(dir = %payload_dir.display(), "payload directory");
    Pipeline::builder(cfg.clone())
        .gateway(Arc::new(FlareSolverrGateway::new(&cfg.gateway)))
        .store(Arc::new(store))
        .sink(Arc::new(JsonFileSink::new(payload_dir)))
        .build()
}

#[cfg(test)]
mod tests;
