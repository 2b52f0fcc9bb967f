//! Backup command
//!
//! Captures the running configuration of every selected device and appends
//! it to the backup store. `--list` shows the stored history instead.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netdrift::store::BackupStore;

/// Arguments for the backup command
#[derive(Parser, Debug, Clone)]
pub struct BackupArgs {
    /// List stored snapshots instead of taking new ones
    #[arg(long)]
    pub list: bool,
}

impl BackupArgs {
    /// Execute the backup command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let targets = ctx.targets()?;

        if self.list {
            let store = ctx.backup_store();
            let mut listing = Vec::with_capacity(targets.len());
            for target in &targets {
                listing.push((target.name.clone(), store.list(&target.name).await?));
            }
            if ctx.output.is_json() {
                let map: std::collections::BTreeMap<_, _> = listing.into_iter().collect();
                ctx.output.json(&map)?;
            } else {
                for (device, handles) in &listing {
                    ctx.output.snapshot_list(device, handles);
                }
            }
            return Ok(0);
        }

        let orchestrator = ctx.orchestrator(ctx.orchestrator_config())?;
        ctx.output.banner("NETDRIFT BACKUP");

        let spinner = ctx
            .output
            .spinner(&format!("Backing up {} device(s)", targets.len()));
        let report = orchestrator.backup_all(&targets).await?;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        ctx.output.backup_report(&report)?;
        Ok(report.exit_code())
    }
}
