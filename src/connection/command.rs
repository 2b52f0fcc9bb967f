//! Shell-template session adapter.
//!
//! Runs every device command through `sh -c` using an operator supplied
//! template such as `ssh -o BatchMode=yes {user}@{host} {command}`. This keeps
//! credentials and transport options in the operator's SSH configuration
//! rather than in netdrift.
//!
//! Placeholders: `{device}`, `{host}`, `{port}`, `{user}`, `{platform}`,
//! `{command}` and any key of the target's `params` map. Substituted values
//! are shell-quoted.

use super::{
    CommandError, CommandResult, ConnectionError, ConnectionResult, DeviceSession, SessionFactory,
};
use crate::inventory::DeviceTarget;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

const COMMAND_PLACEHOLDER: &str = "{command}";

/// Default per-command timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Factory producing [`CommandSession`]s from a shell template.
#[derive(Debug, Clone)]
pub struct CommandSessionFactory {
    template: String,
    command_timeout: Duration,
}

impl CommandSessionFactory {
    /// Create a factory for the given template.
    ///
    /// The template must contain `{command}` exactly once.
    pub fn new(template: impl Into<String>) -> ConnectionResult<Self> {
        let template = template.into();
        match template.matches(COMMAND_PLACEHOLDER).count() {
            1 => Ok(Self {
                template,
                command_timeout: DEFAULT_COMMAND_TIMEOUT,
            }),
            0 => Err(ConnectionError::InvalidConfig(format!(
                "session template '{}' has no {} placeholder",
                template, COMMAND_PLACEHOLDER
            ))),
            _ => Err(ConnectionError::InvalidConfig(format!(
                "session template '{}' uses {} more than once",
                template, COMMAND_PLACEHOLDER
            ))),
        }
    }

    /// Set the per-command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn bindings(target: &DeviceTarget) -> HashMap<String, String> {
        let mut bindings: HashMap<String, String> = target
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        bindings.insert("device".to_string(), target.name.clone());
        bindings.insert("host".to_string(), target.host.clone());
        bindings.insert("platform".to_string(), target.platform.to_string());
        if let Some(port) = target.port {
            bindings.insert("port".to_string(), port.to_string());
        }
        if let Some(user) = &target.username {
            bindings.insert("user".to_string(), user.clone());
        }
        bindings
    }
}

/// Substitute `{name}` placeholders in `text`, shell-quoting each value.
fn render(text: &str, bindings: &HashMap<String, String>) -> ConnectionResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(ConnectionError::InvalidConfig(format!(
                "unterminated placeholder in '{}'",
                text
            )));
        };
        let name = &after[..end];
        let value = bindings.get(name).ok_or_else(|| {
            ConnectionError::InvalidConfig(format!("no value for placeholder {{{}}}", name))
        })?;
        out.push_str(&shell_words::quote(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[async_trait]
impl SessionFactory for CommandSessionFactory {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>> {
        let bindings = Self::bindings(target);
        let (before, after) = self
            .template
            .split_once(COMMAND_PLACEHOLDER)
            .ok_or_else(|| ConnectionError::InvalidConfig(self.template.clone()))?;

        let session = CommandSession {
            device: target.name.clone(),
            prefix: render(before, &bindings)?,
            suffix: render(after, &bindings)?,
            command_timeout: self.command_timeout,
        };
        debug!(device = %target.name, "Opened command session");
        Ok(Box::new(session))
    }
}

/// A logical session: one shell invocation per device command.
#[derive(Debug)]
pub struct CommandSession {
    device: String,
    prefix: String,
    suffix: String,
    command_timeout: Duration,
}

impl CommandSession {
    fn shell_line(&self, command: &str) -> String {
        format!("{}{}{}", self.prefix, shell_words::quote(command), self.suffix)
    }
}

#[async_trait]
impl DeviceSession for CommandSession {
    fn device(&self) -> &str {
        &self.device
    }

    async fn exec(&self, command: &str) -> CommandResult<String> {
        let line = self.shell_line(command);
        trace!(device = %self.device, shell = %line, "Running device command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ConnectionError::from)?;

        let output = match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await
        {
            Ok(result) => result.map_err(ConnectionError::from)?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    command: command.to_string(),
                    timeout_secs: self.command_timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            Err(CommandError::Failed {
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn close(&self) -> ConnectionResult<()> {
        debug!(device = %self.device, "Closed command session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Platform;
    use indexmap::IndexMap;

    fn target() -> DeviceTarget {
        let mut params = IndexMap::new();
        params.insert("jump".to_string(), "bastion 1".to_string());
        DeviceTarget {
            name: "edge-1".to_string(),
            host: "10.0.0.1".to_string(),
            platform: Platform::Ios,
            port: Some(22),
            username: Some("netops".to_string()),
            params,
        }
    }

    #[test]
    fn test_template_requires_command_placeholder() {
        assert!(CommandSessionFactory::new("ssh {host}").is_err());
        assert!(CommandSessionFactory::new("ssh {host} {command} {command}").is_err());
        assert!(CommandSessionFactory::new("ssh {host} {command}").is_ok());
    }

    #[test]
    fn test_render_quotes_values() {
        let bindings = CommandSessionFactory::bindings(&target());
        let rendered = render("ssh -J {jump} -p {port} {user}@{host}", &bindings).unwrap();
        assert_eq!(rendered, "ssh -J 'bastion 1' -p 22 netops@10.0.0.1");
    }

    #[test]
    fn test_render_missing_placeholder() {
        let bindings = CommandSessionFactory::bindings(&target());
        let err = render("ssh {password}@{host}", &bindings).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_exec_through_shell() {
        let factory = CommandSessionFactory::new("echo {device} {command}").unwrap();
        let session = factory.open(&target()).await.unwrap();
        let output = session.exec("show version").await.unwrap();
        assert_eq!(output.trim(), "edge-1 show version");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exec_non_zero_exit() {
        let factory = CommandSessionFactory::new("sh -c 'exit 7' {command}").unwrap();
        let session = factory.open(&target()).await.unwrap();
        let err = session.exec("show version").await.unwrap_err();
        assert!(matches!(err, CommandError::Failed { exit_code: 7, .. }));
    }

    #[tokio::test]
    async fn test_exec_timeout() {
        let factory = CommandSessionFactory::new("sleep 5; echo {command}")
            .unwrap()
            .with_command_timeout(Duration::from_millis(100));
        let session = factory.open(&target()).await.unwrap();
        let err = session.exec("show version").await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }
}
