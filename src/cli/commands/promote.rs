//! Promote command
//!
//! Makes the most recent backup of each selected device its new baseline.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netdrift::store::promote_latest;
use serde_json::json;

/// Arguments for the promote command
#[derive(Parser, Debug, Clone)]
pub struct PromoteArgs {
    /// Devices to promote; defaults to every selected device
    pub devices: Vec<String>,
}

impl PromoteArgs {
    /// Execute the promote command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let devices: Vec<String> = if self.devices.is_empty() {
            ctx.targets()?.into_iter().map(|t| t.name).collect()
        } else {
            self.devices.clone()
        };

        let backups = ctx.backup_store();
        let baselines = ctx.baseline_repository();
        let mut failures = 0;
        let mut promoted = Vec::new();

        for device in &devices {
            match promote_latest(&backups, &baselines, device).await {
                Ok(baseline) => {
                    ctx.output.line(&format!(
                        "{}: baseline version {} ({} statements)",
                        device,
                        baseline.version,
                        baseline.statements.len()
                    ));
                    promoted.push(json!({
                        "device": device,
                        "version": baseline.version,
                        "source_snapshot": baseline.source_snapshot,
                    }));
                }
                Err(e) => {
                    failures += 1;
                    ctx.output.error(&format!("{}: {}", device, e));
                    promoted.push(json!({ "device": device, "error": e.to_string() }));
                }
            }
        }

        if ctx.output.is_json() {
            ctx.output.json(&promoted)?;
        }
        Ok(if failures == 0 { 0 } else { 2 })
    }
}
