//! Deploy command
//!
//! Applies a command file to the selected devices. Each device is backed up
//! first, verified after the change and rolled back when verification
//! fails.

use super::CommandContext;
use anyhow::{bail, Context, Result};
use clap::Parser;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Confirm};
use humantime_serde::re::humantime;
use netdrift::deploy::{DeploymentBatch, RollbackStrategy, VerificationPolicy};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Arguments for the deploy command
#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    /// File of configuration commands; blank lines and `#`/`!` comments are skipped
    #[arg(required = true)]
    pub commands: PathBuf,

    /// Verification policy (strict rolls back, lenient keeps the change with warnings)
    #[arg(long)]
    pub policy: Option<VerificationPolicy>,

    /// Rollback strategy (full-snapshot or delta)
    #[arg(long)]
    pub rollback: Option<RollbackStrategy>,

    /// Save the running configuration on verified devices
    #[arg(long)]
    pub save: bool,

    /// Cancel the batch after this long (e.g. "10m")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Show the plan for each device and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl DeployArgs {
    /// Execute the deploy command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let targets = ctx.targets()?;
        let text = std::fs::read_to_string(&self.commands)
            .with_context(|| format!("Failed to read {}", self.commands.display()))?;
        let batch = DeploymentBatch::uniform(&targets, &text)?;

        let mut config = ctx.orchestrator_config();
        if let Some(policy) = self.policy {
            config.verification = policy;
        }
        if let Some(rollback) = self.rollback {
            config.rollback = rollback;
        }
        if self.save {
            config.save_after_verify = true;
        }
        if let Some(timeout) = &self.timeout {
            config.batch_timeout = Some(
                humantime::parse_duration(timeout)
                    .with_context(|| format!("Invalid timeout '{}'", timeout))?,
            );
        }

        if self.dry_run {
            if ctx.output.is_json() {
                ctx.output.json(&batch.plans().collect::<Vec<_>>())?;
            } else {
                ctx.output.banner("NETDRIFT DEPLOY (DRY RUN)");
                for plan in batch.plans() {
                    ctx.output.section(&plan.device);
                    for command in &plan.commands {
                        ctx.output.line(command);
                    }
                    ctx.output.line(&format!(
                        "{} expected statement change(s)",
                        plan.assertions.len()
                    ));
                }
            }
            return Ok(0);
        }

        if !self.yes && !confirm(batch.len())? {
            ctx.output.warning("Deployment aborted");
            return Ok(1);
        }

        let orchestrator = ctx.orchestrator(config)?;
        ctx.output.banner("NETDRIFT DEPLOY");
        ctx.output.info(&format!(
            "verification {}, rollback {}",
            orchestrator.config().verification,
            orchestrator.config().rollback
        ));

        let spinner = ctx
            .output
            .spinner(&format!("Deploying to {} device(s)", batch.len()));
        let report = orchestrator.deploy(batch).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        ctx.output.deployment_report(&report)?;
        Ok(report.exit_code())
    }
}

fn confirm(devices: usize) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Refusing to deploy without confirmation; pass --yes");
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Apply changes to {} device(s)?", devices))
        .default(false)
        .interact_on(&Term::stderr())?;
    Ok(confirmed)
}
