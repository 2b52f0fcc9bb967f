//! Configuration for netdrift
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netdrift/netdrift.toml)
//! - User configuration (~/.netdrift.toml, then the platform config directory)
//! - Project configuration (./netdrift.toml)
//! - An explicit `--config` file
//! - Environment variables (`NETDRIFT_*`)
//!
//! Files are merged key by key, so a project file that only sets
//! `deployment.rollback` keeps everything else from the layers below it.

use crate::connection::command::DEFAULT_COMMAND_TIMEOUT;
use crate::connection::CommandSessionFactory;
use crate::deploy::{OrchestratorConfig, RollbackStrategy, VerificationPolicy, DEFAULT_CONCURRENCY};
use anyhow::{anyhow, bail, Context, Result};
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default session command template
pub const DEFAULT_COMMAND_TEMPLATE: &str = "ssh -o BatchMode=yes {host} {command}";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run-wide defaults
    pub defaults: Defaults,

    /// Where snapshots and baselines live
    pub storage: StorageConfig,

    /// Deployment behaviour
    pub deployment: DeploymentConfig,

    /// How device sessions are opened
    pub session: SessionConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Default inventory path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,

    /// Devices worked on at the same time
    pub concurrency: usize,

    /// Cancel a batch after this long (e.g. "15m")
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub batch_timeout: Option<Duration>,

    /// Timeout of a single device command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            inventory: None,
            concurrency: DEFAULT_CONCURRENCY,
            batch_timeout: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot history root
    pub backup_dir: PathBuf,
    /// Baseline documents root
    pub baseline_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
            baseline_dir: PathBuf::from("baselines"),
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub rollback: RollbackStrategy,
    pub verification: VerificationPolicy,
    /// Save the running configuration after a verified change
    pub save_after_verify: bool,
    /// Path regexes ignored by drift detection and verification
    pub ignore_paths: Vec<String>,
    /// Keep the snapshots taken by `drift` as backups
    pub persist_drift_snapshots: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            rollback: RollbackStrategy::default(),
            verification: VerificationPolicy::default(),
            save_after_verify: false,
            ignore_paths: Vec::new(),
            persist_drift_snapshots: true,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Shell command line with one `{command}` placeholder; `{host}`,
    /// `{device}`, `{platform}`, `{port}`, `{user}` and inventory params are
    /// substituted too
    pub command_template: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_template: DEFAULT_COMMAND_TEMPLATE.to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when neither `-v` nor `RUST_LOG` is given
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut merged = toml::Value::try_from(Config::default())
            .context("Failed to encode default configuration")?;

        for path in Self::get_config_paths() {
            if path.exists() {
                merge_values(&mut merged, Self::read_file(&path)?);
            }
        }

        if let Some(path) = config_path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            merge_values(&mut merged, Self::read_file(path)?);
        }

        let mut config: Config = merged
            .try_into()
            .context("Invalid configuration after merging config files")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Standard configuration file locations, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/netdrift/netdrift.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netdrift.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("netdrift").join("netdrift.toml"));
        }

        paths.push(PathBuf::from("netdrift.toml"));
        paths
    }

    fn read_file(path: &Path) -> Result<toml::Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse a single configuration document on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut merged = toml::Value::try_from(Config::default())?;
        merge_values(&mut merged, toml::from_str(content)?);
        Ok(merged.try_into()?)
    }

    /// Apply `NETDRIFT_*` overrides using `lookup` to read variables
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("NETDRIFT_INVENTORY") {
            self.defaults.inventory = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("NETDRIFT_CONCURRENCY") {
            self.defaults.concurrency = value
                .parse()
                .with_context(|| format!("NETDRIFT_CONCURRENCY: invalid number '{}'", value))?;
        }

        if let Some(value) = lookup("NETDRIFT_BATCH_TIMEOUT") {
            let timeout = humantime::parse_duration(&value)
                .with_context(|| format!("NETDRIFT_BATCH_TIMEOUT: invalid duration '{}'", value))?;
            self.defaults.batch_timeout = Some(timeout);
        }

        if let Some(path) = lookup("NETDRIFT_BACKUP_DIR") {
            self.storage.backup_dir = PathBuf::from(path);
        }

        if let Some(path) = lookup("NETDRIFT_BASELINE_DIR") {
            self.storage.baseline_dir = PathBuf::from(path);
        }

        if let Some(value) = lookup("NETDRIFT_ROLLBACK") {
            self.deployment.rollback = value
                .parse()
                .map_err(|e: String| anyhow!("NETDRIFT_ROLLBACK: {}", e))?;
        }

        if let Some(value) = lookup("NETDRIFT_VERIFICATION") {
            self.deployment.verification = value
                .parse()
                .map_err(|e: String| anyhow!("NETDRIFT_VERIFICATION: {}", e))?;
        }

        if let Some(template) = lookup("NETDRIFT_COMMAND_TEMPLATE") {
            self.session.command_template = template;
        }

        if let Some(value) = lookup("NETDRIFT_LOG_FORMAT") {
            self.logging.format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => bail!("NETDRIFT_LOG_FORMAT: unknown format '{}'", other),
            };
        }

        Ok(())
    }

    /// Get the effective inventory path
    pub fn inventory_path(&self) -> Option<&PathBuf> {
        self.defaults.inventory.as_ref()
    }

    /// Orchestrator settings from this configuration
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency: self.defaults.concurrency.max(1),
            batch_timeout: self.defaults.batch_timeout,
            rollback: self.deployment.rollback,
            verification: self.deployment.verification,
            save_after_verify: self.deployment.save_after_verify,
            ignore_patterns: self.deployment.ignore_paths.clone(),
            persist_drift_snapshots: self.deployment.persist_drift_snapshots,
        }
    }

    /// Session factory for the configured command template
    pub fn session_factory(&self) -> Result<CommandSessionFactory> {
        let factory = CommandSessionFactory::new(&self.session.command_template)
            .context("Invalid session.command_template")?;
        Ok(factory.with_command_timeout(self.defaults.command_timeout))
    }
}

/// Recursively merge `overlay` into `base`; tables merge, everything else
/// is replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.concurrency, 5);
        assert_eq!(config.defaults.command_timeout, Duration::from_secs(60));
        assert_eq!(config.deployment.rollback, RollbackStrategy::FullSnapshot);
        assert_eq!(config.deployment.verification, VerificationPolicy::Strict);
        assert_eq!(config.storage.backup_dir, PathBuf::from("backups"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
[defaults]
concurrency = 10
batch_timeout = "15m"

[deployment]
rollback = "delta"
ignore_paths = ["^ntp/clock-period"]
"#,
        )
        .unwrap();
        assert_eq!(config.defaults.concurrency, 10);
        assert_eq!(config.defaults.batch_timeout, Some(Duration::from_secs(900)));
        assert_eq!(config.defaults.command_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(config.deployment.rollback, RollbackStrategy::Delta);
        assert_eq!(config.deployment.verification, VerificationPolicy::Strict);
        assert_eq!(config.session.command_template, DEFAULT_COMMAND_TEMPLATE);
    }

    #[test]
    fn test_merge_values_is_deep() {
        let mut base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        merge_values(&mut base, toml::from_str("[a]\ny = 3\n").unwrap());
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = [
            ("NETDRIFT_CONCURRENCY", "20"),
            ("NETDRIFT_VERIFICATION", "lenient"),
            ("NETDRIFT_BATCH_TIMEOUT", "30s"),
            ("NETDRIFT_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.defaults.concurrency, 20);
        assert_eq!(config.deployment.verification, VerificationPolicy::Lenient);
        assert_eq!(config.defaults.batch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "NETDRIFT_ROLLBACK").then(|| "undo".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_orchestrator_config() {
        let mut config = Config::default();
        config.defaults.concurrency = 0;
        config.deployment.save_after_verify = true;
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.concurrency, 1);
        assert!(orchestrator.save_after_verify);
    }

    #[test]
    fn test_session_factory_requires_command_placeholder() {
        let mut config = Config::default();
        assert!(config.session_factory().is_ok());
        config.session.command_template = "ssh {host}".to_string();
        assert!(config.session_factory().is_err());
    }
}
