//! Subcommands module for the netdrift CLI

pub mod backup;
pub mod deploy;
pub mod drift;
pub mod promote;

use crate::cli::output::OutputFormatter;
use anyhow::{bail, Context, Result};
use netdrift::config::Config;
use netdrift::deploy::{Orchestrator, OrchestratorConfig};
use netdrift::inventory::{DeviceTarget, Inventory};
use netdrift::store::{FileBackupStore, FileBaselineRepository};
use std::path::PathBuf;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Inventory path from the command line
    pub inventory_path: Option<PathBuf>,
    /// Limit pattern
    pub limit: Option<String>,
    /// Concurrency override
    pub concurrency: Option<usize>,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            inventory_path: cli.inventory.clone(),
            limit: cli.limit.clone(),
            concurrency: cli.concurrency,
        }
    }

    /// Get the effective inventory path
    pub fn inventory(&self) -> Option<&PathBuf> {
        self.inventory_path
            .as_ref()
            .or(self.config.inventory_path())
    }

    /// Load the inventory and apply `--limit`
    pub fn targets(&self) -> Result<Vec<DeviceTarget>> {
        let Some(path) = self.inventory() else {
            bail!("No inventory given; use --inventory or set defaults.inventory");
        };
        let inventory = Inventory::load(path)
            .with_context(|| format!("Failed to load inventory {}", path.display()))?;

        let targets = match &self.limit {
            Some(pattern) => inventory.select(pattern)?,
            None => inventory.devices().cloned().collect(),
        };
        if targets.is_empty() {
            bail!("No devices selected");
        }
        self.output
            .info(&format!("{} device(s) selected", targets.len()));
        Ok(targets)
    }

    /// Backup store from the configuration
    pub fn backup_store(&self) -> FileBackupStore {
        FileBackupStore::new(&self.config.storage.backup_dir)
    }

    /// Baseline repository from the configuration
    pub fn baseline_repository(&self) -> FileBaselineRepository {
        FileBaselineRepository::new(&self.config.storage.baseline_dir)
    }

    /// Orchestrator settings with command-line overrides applied
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = self.config.orchestrator_config();
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
        config
    }

    /// Build an orchestrator over the file stores
    pub fn orchestrator(&self, config: OrchestratorConfig) -> Result<Orchestrator> {
        let sessions = self.config.session_factory()?;
        Ok(Orchestrator::new(
            Arc::new(sessions),
            Arc::new(self.backup_store()),
            Arc::new(self.baseline_repository()),
            config,
        )?)
    }
}
