//! Session layer for device communication.
//!
//! The engine never speaks a transport protocol itself. It asks a
//! [`SessionFactory`] for a [`DeviceSession`] and sends CLI commands through
//! it; SSH, Telnet, console servers or a test double all sit behind the same
//! two traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use netdrift::connection::{CommandSessionFactory, SessionFactory};
//!
//! let factory = CommandSessionFactory::new("ssh -o BatchMode=yes {user}@{host} {command}")?;
//! let session = factory.open(&target).await?;
//! let output = session.exec("show running-config").await?;
//! session.close().await?;
//! ```

/// Session adapter that runs each command through a shell template.
pub mod command;

use crate::inventory::DeviceTarget;
use async_trait::async_trait;
use thiserror::Error;

pub use command::CommandSessionFactory;

/// Errors that can occur while opening, using or closing a session.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish a session with the device.
    #[error("Connection to '{device}' failed: {message}")]
    ConnectionFailed {
        /// Device identifier
        device: String,
        /// Error message
        message: String,
    },

    /// Authentication was rejected by the device.
    #[error("Authentication to '{0}' failed")]
    AuthenticationFailed(String),

    /// Connection attempt timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// The session was closed or lost while in use.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session configuration is invalid or incomplete.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during session operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConnectionError {
    /// Creates a new connection failed error.
    pub fn failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::Timeout(_)
                | ConnectionError::ConnectionClosed
                | ConnectionError::ConnectionFailed { .. }
        )
    }
}

/// Result type for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Errors produced by a single command on an open session.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The device answered with one of its error markers.
    #[error("Device rejected '{command}': {message}")]
    Rejected {
        /// Command that was sent
        command: String,
        /// Error line printed by the device
        message: String,
    },

    /// The command could not be executed by the transport.
    #[error("Command '{command}' failed (exit code {exit_code}): {stderr}")]
    Failed {
        /// Command that was sent
        command: String,
        /// Exit code reported by the transport
        exit_code: i32,
        /// Standard error output
        stderr: String,
    },

    /// The command did not complete in time.
    #[error("Command '{command}' timed out after {timeout_secs} seconds")]
    Timeout {
        /// Command that was sent
        command: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// The underlying session failed while the command was in flight.
    #[error("Session failure: {0}")]
    Transport(#[from] ConnectionError),
}

/// Result type for command execution.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// An open CLI session with one device.
///
/// Implementations must be usable from a single worker task; the engine never
/// issues two commands on the same session concurrently.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Identifier of the device this session talks to.
    fn device(&self) -> &str;

    /// Execute one CLI command and return its raw output.
    async fn exec(&self, command: &str) -> CommandResult<String>;

    /// Execute commands in order, stopping at the first failure.
    async fn exec_all(&self, commands: &[String]) -> CommandResult<Vec<String>> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            outputs.push(self.exec(command).await?);
        }
        Ok(outputs)
    }

    /// Close the session. Called exactly once per opened session.
    async fn close(&self) -> ConnectionResult<()>;
}

/// Opens sessions to device targets.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a session to the given target.
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>>;
}
