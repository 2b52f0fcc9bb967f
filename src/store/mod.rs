//! Snapshot and baseline persistence.
//!
//! Two stores back the engine:
//!
//! - [`BackupStore`]: append-only history of captured snapshots per device.
//!   A save only reports success once the snapshot is durable.
//! - [`BaselineRepository`]: the current approved configuration per device,
//!   replaced by explicit promotion with a monotonically increasing version.
//!
//! Both come with a file backend and an in-memory backend for tests.

pub mod file;
pub mod memory;

pub use file::{FileBackupStore, FileBaselineRepository};
pub use memory::{MemoryBackupStore, MemoryBaselineRepository};

use crate::snapshot::{Baseline, ConfigSnapshot, SnapshotHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by stores and repositories
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or written
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// No record exists for the request
    #[error("no record found for '{0}'")]
    NotFound(String),

    /// A stored record failed validation
    #[error("corrupt record at {location}: {message}")]
    Corrupt { location: String, message: String },

    /// The request is inconsistent (e.g. snapshot for another device)
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-only snapshot history
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Durably persist a snapshot and return a handle to it
    async fn save(&self, snapshot: &ConfigSnapshot) -> StoreResult<SnapshotHandle>;

    /// Load the most recent snapshot taken at or before `at_or_before`
    async fn load(&self, device: &str, at_or_before: DateTime<Utc>) -> StoreResult<ConfigSnapshot>;

    /// Handles for all snapshots of a device, oldest first
    async fn list(&self, device: &str) -> StoreResult<Vec<SnapshotHandle>>;

    /// Load the newest snapshot of a device
    async fn latest(&self, device: &str) -> StoreResult<ConfigSnapshot> {
        self.load(device, Utc::now()).await
    }
}

/// Approved baselines, one current version per device
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    /// Current baseline of a device
    async fn get(&self, device: &str) -> StoreResult<Baseline>;

    /// Replace the device's baseline with the statements of `snapshot`
    async fn promote(&self, device: &str, snapshot: &ConfigSnapshot) -> StoreResult<Baseline>;
}

/// Reject promotion of a snapshot that belongs to a different device
pub(crate) fn check_promotion(device: &str, snapshot: &ConfigSnapshot) -> StoreResult<()> {
    if snapshot.device != device {
        return Err(StoreError::Rejected(format!(
            "snapshot of '{}' cannot become the baseline of '{}'",
            snapshot.device, device
        )));
    }
    Ok(())
}

/// Promote the newest stored snapshot of a device to its baseline
pub async fn promote_latest(
    backups: &dyn BackupStore,
    baselines: &dyn BaselineRepository,
    device: &str,
) -> StoreResult<Baseline> {
    let snapshot = backups.latest(device).await?;
    baselines.promote(device, &snapshot).await
}
