//! Platform-aware wrapper around an open device session.

use super::{normalize, parse_interfaces, parse_statements, Platform};
use crate::connection::{CommandError, CommandResult, ConnectionResult, DeviceSession};
use crate::error::{Error, Result};
use crate::snapshot::{ConfigSnapshot, Statement};
use tracing::{debug, warn};

/// A device session paired with the platform's command set.
pub struct NetworkDevice {
    name: String,
    platform: Platform,
    session: Box<dyn DeviceSession>,
}

impl NetworkDevice {
    /// Wrap an open session
    pub fn new(name: impl Into<String>, platform: Platform, session: Box<dyn DeviceSession>) -> Self {
        Self {
            name: name.into(),
            platform,
            session,
        }
    }

    /// Device identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device platform
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Disable paging and widen the terminal. Failures are ignored since
    /// not every transport presents an interactive terminal.
    pub async fn prepare(&self) {
        for command in self.platform.prepare_session() {
            if let Err(e) = self.session.exec(&command).await {
                debug!(device = %self.name, command = %command, error = %e, "Session preparation command failed");
            }
        }
    }

    /// Fetch the raw running configuration
    pub async fn running_config(&self) -> CommandResult<String> {
        let command = self.platform.show_running_config();
        let output = self.session.exec(command).await?;
        self.platform.check_output(command, &output)?;
        Ok(clean_config_output(command, &output))
    }

    /// Capture and normalize the running configuration.
    ///
    /// `show version` feeds the fact map only; if it fails the snapshot is
    /// still taken without those facts.
    pub async fn snapshot(&self) -> Result<ConfigSnapshot> {
        let running = self.running_config().await?;

        let version_command = self.platform.show_version();
        let version = match self.session.exec(version_command).await {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(device = %self.name, error = %e, "Could not collect device facts");
                None
            }
        };

        normalize(&self.name, self.platform, &running, version.as_deref())
            .map_err(|e| Error::parse(&self.name, e))
    }

    /// Capture a full backup record: the normalized running configuration
    /// plus the startup configuration and interface states.
    ///
    /// Only the running configuration is mandatory. The other two are
    /// collected best-effort and left out of the record when the device
    /// cannot produce them.
    pub async fn backup(&self) -> Result<ConfigSnapshot> {
        let mut snapshot = self.snapshot().await?;

        match self.startup_config().await {
            Ok(startup) => snapshot = snapshot.with_startup(startup),
            Err(e) => warn!(device = %self.name, error = %e, "Could not collect startup configuration"),
        }

        let command = self.platform.show_interfaces();
        match self.exec_checked(command).await {
            Ok(output) => {
                let interfaces = parse_interfaces(self.platform, &output);
                if interfaces.is_empty() {
                    debug!(device = %self.name, "No interface state found");
                }
                snapshot = snapshot.with_interfaces(interfaces);
            }
            Err(e) => warn!(device = %self.name, error = %e, "Could not collect interface state"),
        }

        Ok(snapshot)
    }

    async fn startup_config(&self) -> Result<Vec<Statement>> {
        let command = self.platform.show_startup_config();
        let output = self.exec_checked(command).await?;
        parse_statements(self.platform, &clean_config_output(command, &output))
            .map_err(|e| Error::parse(&self.name, e))
    }

    /// Apply configuration commands inside configuration mode.
    ///
    /// Every command's output is checked for the platform's error markers.
    /// On the first failure the configuration session is abandoned and the
    /// error returned.
    pub async fn apply(&self, commands: &[String]) -> CommandResult<()> {
        for command in self.platform.wrap_config(commands) {
            if let Err(e) = self.exec_checked(&command).await {
                self.abort_config_mode().await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Persist the running configuration
    pub async fn save(&self) -> CommandResult<()> {
        for command in self.platform.save_config() {
            self.exec_checked(&command).await?;
        }
        Ok(())
    }

    /// Close the underlying session
    pub async fn close(&self) -> ConnectionResult<()> {
        self.session.close().await
    }

    async fn exec_checked(&self, command: &str) -> CommandResult<String> {
        let output = self.session.exec(command).await?;
        self.platform.check_output(command, &output)?;
        Ok(output)
    }

    async fn abort_config_mode(&self) {
        for command in self.platform.abort_config_mode() {
            if let Err(e) = self.session.exec(&command).await {
                if matches!(e, CommandError::Transport(_)) {
                    break;
                }
            }
        }
    }
}

/// Remove the command echo and trailing prompt lines from CLI output.
fn clean_config_output(command: &str, output: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if lines.first().is_some_and(|first| first.trim().ends_with(command)) {
        lines.remove(0);
    }

    while let Some(last) = lines.last() {
        let last = last.trim();
        if last.is_empty() || last.ends_with('#') || last.ends_with('>') {
            lines.pop();
        } else {
            break;
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_config_output() {
        let output = "sw1#show running-config\nhostname sw1\nvlan 10\n name SALES\nend\n\nsw1#";
        assert_eq!(
            clean_config_output("show running-config", output),
            "hostname sw1\nvlan 10\n name SALES\nend"
        );
    }

    #[test]
    fn test_clean_config_output_without_echo() {
        let output = "system {\n    host-name edge-7;\n}\n\nnetops@edge-7>";
        assert_eq!(
            clean_config_output("show configuration", output),
            "system {\n    host-name edge-7;\n}"
        );
    }
}
