//! CLI module for netdrift
//!
//! Argument parsing and subcommand dispatch. The heavy lifting lives in the
//! library; subcommands load the inventory, build an orchestrator from the
//! configuration and print the resulting report.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// netdrift - network configuration backup, drift detection and safe deployment
#[derive(Parser, Debug, Clone)]
#[command(name = "netdrift")]
#[command(author = "Netdrift Contributors")]
#[command(version)]
#[command(about = "Configuration backup, drift detection and safe deployment for network devices", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the device inventory (YAML)
    #[arg(short = 'i', long, global = true, env = "NETDRIFT_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Limit to devices matching a pattern (comma separated, `*` wildcards)
    #[arg(short = 'l', long, global = true)]
    pub limit: Option<String>,

    /// Devices worked on at the same time
    #[arg(short = 'f', long, global = true)]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "NETDRIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON report on stdout
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Capture and store the running configuration of every device
    Backup(commands::backup::BackupArgs),

    /// Compare running configurations with baselines or previous backups
    Drift(commands::drift::DriftArgs),

    /// Apply a command file with backup, verification and rollback
    Deploy(commands::deploy::DeployArgs),

    /// Promote the latest backup of devices to their baseline
    Promote(commands::promote::PromoteArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
