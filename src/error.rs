//! Error types for netdrift.
//!
//! Each concern owns a focused error enum (`ConnectionError`, `CommandError`,
//! `ParseError`, `StoreError`); this module ties them together into the
//! top-level [`Error`] returned by batch-level operations.

use crate::connection::{CommandError, ConnectionError};
use crate::inventory::InventoryError;
use crate::network::ParseError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for netdrift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for netdrift.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Batch Errors
    // ========================================================================
    /// A batch was submitted without any devices.
    #[error("Batch contains no devices")]
    EmptyBatch,

    /// The same device identifier appears more than once in a batch or inventory.
    #[error("Device '{0}' appears more than once")]
    DuplicateDevice(String),

    /// A plan refers to a device that has no connection target.
    #[error("No connection target for device '{0}'")]
    UnknownDevice(String),

    // ========================================================================
    // Platform / Parse Errors
    // ========================================================================
    /// Unknown platform tag.
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),

    /// Device output could not be normalized.
    #[error("Failed to parse configuration of '{device}': {source}")]
    Parse {
        /// Device identifier
        device: String,
        /// Underlying parse error
        #[source]
        source: ParseError,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Session could not be opened or was lost.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A command failed or was rejected by the device.
    #[error(transparent)]
    Command(#[from] CommandError),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Backup store or baseline repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ========================================================================
    // Inventory Errors
    // ========================================================================
    /// Error loading or querying the device inventory.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // I/O and Serialization Errors
    // ========================================================================
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ========================================================================
    // Internal Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new parse error for a device.
    pub fn parse(device: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            device: device.into(),
            source,
        }
    }

    /// Creates a new invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Connection(e) => e.is_transient(),
            Error::Command(CommandError::Timeout { .. }) => true,
            Error::Store(StoreError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Connection(_) | Error::Command(_) => 3,
            Error::Parse { .. } | Error::UnknownPlatform(_) => 4,
            Error::Inventory(_)
            | Error::UnknownDevice(_)
            | Error::DuplicateDevice(_)
            | Error::EmptyBatch => 5,
            Error::Store(_) => 6,
            _ => 1,
        }
    }
}
