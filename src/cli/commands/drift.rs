//! Drift command
//!
//! Compares the live configuration of the selected devices with their
//! baselines, or with their most recent backup.

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use netdrift::drift::DriftReference;

/// Reference to compare against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Against {
    /// The promoted baseline
    #[default]
    Baseline,
    /// The most recent stored backup
    Previous,
}

impl From<Against> for DriftReference {
    fn from(against: Against) -> Self {
        match against {
            Against::Baseline => DriftReference::Baseline,
            Against::Previous => DriftReference::PreviousBackup,
        }
    }
}

/// Arguments for the drift command
#[derive(Parser, Debug, Clone)]
pub struct DriftArgs {
    /// What to compare the running configuration with
    #[arg(long, value_enum, default_value = "baseline")]
    pub against: Against,

    /// Do not store the captured snapshots as backups
    #[arg(long)]
    pub no_store: bool,
}

impl DriftArgs {
    /// Execute the drift command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let targets = ctx.targets()?;
        let mut config = ctx.orchestrator_config();
        if self.no_store {
            config.persist_drift_snapshots = false;
        }
        let orchestrator = ctx.orchestrator(config)?;
        ctx.output.banner("NETDRIFT DRIFT");

        let spinner = ctx
            .output
            .spinner(&format!("Assessing {} device(s)", targets.len()));
        let report = orchestrator
            .assess_drift(&targets, self.against.into())
            .await?;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        ctx.output.drift_report(&report)?;
        Ok(report.exit_code())
    }
}
