//! In-memory stores, used by tests and dry runs.

use super::{check_promotion, BackupStore, BaselineRepository, StoreError, StoreResult};
use crate::snapshot::{Baseline, ConfigSnapshot, SnapshotHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

fn handle(snapshot: &ConfigSnapshot) -> SnapshotHandle {
    SnapshotHandle {
        id: snapshot.id,
        device: snapshot.device.clone(),
        taken_at: snapshot.taken_at,
        location: format!("memory://{}/{}", snapshot.device, snapshot.id),
    }
}

/// In-memory append-only snapshot history
#[derive(Debug, Default)]
pub struct MemoryBackupStore {
    snapshots: DashMap<String, Vec<ConfigSnapshot>>,
}

impl MemoryBackupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots stored for a device
    pub fn count(&self, device: &str) -> usize {
        self.snapshots.get(device).map_or(0, |s| s.len())
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn save(&self, snapshot: &ConfigSnapshot) -> StoreResult<SnapshotHandle> {
        let mut history = self.snapshots.entry(snapshot.device.clone()).or_default();
        if history.iter().any(|s| s.id == snapshot.id) {
            return Err(StoreError::Rejected(format!(
                "snapshot {} is already stored",
                snapshot.id
            )));
        }
        let position = history.partition_point(|s| s.taken_at <= snapshot.taken_at);
        history.insert(position, snapshot.clone());
        Ok(handle(snapshot))
    }

    async fn load(&self, device: &str, at_or_before: DateTime<Utc>) -> StoreResult<ConfigSnapshot> {
        self.snapshots
            .get(device)
            .and_then(|history| {
                history
                    .iter()
                    .rev()
                    .find(|s| s.taken_at <= at_or_before)
                    .cloned()
            })
            .ok_or_else(|| StoreError::NotFound(device.to_string()))
    }

    async fn list(&self, device: &str) -> StoreResult<Vec<SnapshotHandle>> {
        Ok(self
            .snapshots
            .get(device)
            .map(|history| history.iter().map(handle).collect())
            .unwrap_or_default())
    }
}

/// In-memory baseline repository
#[derive(Debug, Default)]
pub struct MemoryBaselineRepository {
    baselines: DashMap<String, Baseline>,
}

impl MemoryBaselineRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaselineRepository for MemoryBaselineRepository {
    async fn get(&self, device: &str) -> StoreResult<Baseline> {
        self.baselines
            .get(device)
            .map(|b| b.clone())
            .ok_or_else(|| StoreError::NotFound(device.to_string()))
    }

    async fn promote(&self, device: &str, snapshot: &ConfigSnapshot) -> StoreResult<Baseline> {
        check_promotion(device, snapshot)?;
        let mut entry = self.baselines.entry(device.to_string());
        let version = match &mut entry {
            dashmap::mapref::entry::Entry::Occupied(current) => current.get().version + 1,
            dashmap::mapref::entry::Entry::Vacant(_) => 1,
        };
        let baseline = Baseline::from_snapshot(snapshot, version);
        entry.insert(baseline.clone());
        Ok(baseline)
    }
}
