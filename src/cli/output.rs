//! Output formatting for netdrift
//!
//! Human output is colored with `colored`; `--output json` prints the report
//! values as JSON on stdout and keeps messages on stderr.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use netdrift::deploy::{DeploymentResult, Outcome};
use netdrift::drift::{DriftEntry, DriftOutcome};
use netdrift::report::{BackupOutcome, BackupReport, BatchReport, DriftReport};
use netdrift::snapshot::SnapshotHandle;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::time::Duration;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether reports are printed as JSON
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        println!("\n{}", line.bright_blue());
        println!("{}", format!("  {}  ", title).bright_blue().bold());
        println!("{}\n", line.bright_blue());
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        println!("\n{}", title.cyan().bold());
        println!("{}", "-".repeat(title.len()).cyan());
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "ERROR:".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", "WARNING:".yellow().bold(), message);
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 {
            return;
        }
        eprintln!("{} {}", "INFO:".blue(), message);
    }

    /// Print a plain line of human output
    pub fn line(&self, message: &str) {
        if !self.json_mode {
            println!("{}", message);
        }
    }

    /// Print any report as pretty JSON
    pub fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Spinner shown while a batch runs
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.json_mode || !self.use_color {
            return None;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }

    fn outcome_label(outcome: Outcome) -> String {
        match outcome {
            Outcome::Verified => outcome.as_str().green().to_string(),
            Outcome::VerifiedWithWarnings => outcome.as_str().yellow().to_string(),
            Outcome::RolledBack => outcome.as_str().magenta().to_string(),
            Outcome::Failed => outcome.as_str().red().bold().to_string(),
            Outcome::Cancelled => outcome.as_str().cyan().to_string(),
        }
    }

    fn handle_line(handle: &SnapshotHandle) -> String {
        format!(
            "{} ({})",
            handle.location,
            handle.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    /// Print one deployment result
    pub fn deployment_result(&self, result: &DeploymentResult) {
        println!(
            "{}: [{}] {}",
            result.device.bold(),
            Self::outcome_label(result.outcome),
            format!("reached {}", result.phase_reached).bright_black()
        );
        if let Some(error) = &result.error {
            println!("  {}", error);
        }
        for warning in &result.warnings {
            println!("  {} {}", "warning:".yellow(), warning);
        }
        for entry in &result.unexpected {
            self.drift_entry(entry);
        }
        if self.verbosity >= 1 {
            if let Some(handle) = &result.pre_snapshot {
                println!("  pre-change snapshot: {}", Self::handle_line(handle));
            }
            if let Some(handle) = &result.post_snapshot {
                println!("  post-change snapshot: {}", Self::handle_line(handle));
            }
        }
        if result.indeterminate {
            println!(
                "  {}",
                "configuration state unknown, inspect this device manually".red().bold()
            );
        }
    }

    /// Print a deployment batch report
    pub fn deployment_report(&self, report: &BatchReport) -> anyhow::Result<()> {
        if self.json_mode {
            return self.json(report);
        }

        self.section("DEPLOYMENT RESULTS");
        for result in report.results.values() {
            self.deployment_result(result);
        }

        let summary = report.summary();
        self.section("SUMMARY");
        if report.cancelled {
            println!("{}", "Batch was cancelled before every device finished".cyan());
        }
        let text = summary.to_string();
        if summary.attention.is_empty() {
            print!("{}", text.green());
        } else {
            print!("{}", text.red());
        }
        Ok(())
    }

    /// Print a single drift entry; multi-line bodies are shown as a line diff
    pub fn drift_entry(&self, entry: &DriftEntry) {
        match entry {
            DriftEntry::Changed { path, old, new } if old.contains('\n') || new.contains('\n') => {
                println!("  {} {}", "~".yellow(), path.to_string().yellow());
                let diff = TextDiff::from_lines(old.as_str(), new.as_str());
                for change in diff.iter_all_changes() {
                    let line = change.to_string_lossy();
                    let line = line.trim_end_matches('\n');
                    match change.tag() {
                        ChangeTag::Delete => println!("      {}", format!("- {}", line).red()),
                        ChangeTag::Insert => println!("      {}", format!("+ {}", line).green()),
                        ChangeTag::Equal => println!("        {}", line),
                    }
                }
            }
            DriftEntry::Added { .. } => println!("  {}", entry.to_string().green()),
            DriftEntry::Changed { .. } => println!("  {}", entry.to_string().yellow()),
            DriftEntry::Removed { .. } => println!("  {}", entry.to_string().red()),
        }
    }

    /// Print a drift report
    pub fn drift_report(&self, report: &DriftReport) -> anyhow::Result<()> {
        if self.json_mode {
            return self.json(report);
        }

        self.section(&format!("DRIFT AGAINST {}", report.reference.to_string().to_uppercase()));
        for (device, outcome) in &report.results {
            match outcome {
                DriftOutcome::Assessed(record) if record.has_drift() => {
                    let (added, changed, removed) = record.counts();
                    println!(
                        "{}: {} (+{} ~{} -{})",
                        device.bold(),
                        "drifted".yellow(),
                        added,
                        changed,
                        removed
                    );
                    for entry in &record.entries {
                        self.drift_entry(entry);
                    }
                }
                DriftOutcome::Assessed(_) => println!("{}: {}", device.bold(), "in sync".green()),
                DriftOutcome::Unassessed { reason, .. } => {
                    println!("{}: {} ({})", device.bold(), "unassessed".cyan(), reason)
                }
                DriftOutcome::Failed { error, .. } => {
                    println!("{}: {} {}", device.bold(), "failed".red().bold(), error)
                }
                DriftOutcome::Cancelled { .. } => println!("{}: {}", device.bold(), "cancelled".yellow()),
            }
        }

        self.section("SUMMARY");
        println!("{}", report.summary());
        Ok(())
    }

    /// Print a backup report
    pub fn backup_report(&self, report: &BackupReport) -> anyhow::Result<()> {
        if self.json_mode {
            return self.json(report);
        }

        self.section("BACKUP RESULTS");
        for (device, outcome) in &report.results {
            match outcome {
                BackupOutcome::Saved { handle, statements } => println!(
                    "{}: {} {} statements -> {}",
                    device.bold(),
                    "saved".green(),
                    statements,
                    handle.location
                ),
                BackupOutcome::Failed { error } => {
                    println!("{}: {} {}", device.bold(), "failed".red().bold(), error)
                }
                BackupOutcome::Cancelled => println!("{}: {}", device.bold(), "cancelled".cyan()),
            }
        }

        self.section("SUMMARY");
        print!("{}", report);
        Ok(())
    }

    /// Print stored snapshot handles of a device
    pub fn snapshot_list(&self, device: &str, handles: &[SnapshotHandle]) {
        println!("{} ({} snapshot(s))", device.bold(), handles.len());
        for handle in handles {
            println!("  {} {}", handle.id.to_string().bright_black(), Self::handle_line(handle));
        }
    }
}
