//! File-backed stores.
//!
//! Layout under the backup root:
//!
//! ```text
//! <root>/<device>/<YYYYmmddTHHMMSS.fffffffffZ>-<snapshot id>.json
//! ```
//!
//! and under the baseline root:
//!
//! ```text
//! <root>/<device>.json
//! ```
//!
//! Device identifiers are escaped so they are safe as file names. Every record
//! carries a SHA-256 checksum of its statements, verified on load.

use super::{check_promotion, BackupStore, BaselineRepository, StoreError, StoreResult};
use crate::snapshot::{statements_checksum, Baseline, ConfigSnapshot, SnapshotHandle};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

const FORMAT_VERSION: u32 = 1;
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Escape a device identifier into a single safe path component.
pub(crate) fn escape_device(device: &str) -> String {
    let mut escaped = String::with_capacity(device.len());
    for (i, byte) in device.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if safe {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    format: u32,
    checksum: String,
    snapshot: ConfigSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct BaselineRecord {
    format: u32,
    checksum: String,
    baseline: Baseline,
}

/// Write `bytes` to `tmp`, flush it to stable storage and fsync.
async fn write_synced(tmp: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Make a completed rename or link durable.
async fn sync_dir(dir: &Path) -> StoreResult<()> {
    let handle = tokio::fs::File::open(dir).await?;
    handle.sync_all().await?;
    Ok(())
}

fn corrupt(path: &Path, message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        location: path.display().to_string(),
        message: message.into(),
    }
}

fn parse_file_name(name: &str) -> Option<(DateTime<Utc>, Uuid)> {
    let stem = name.strip_suffix(".json")?;
    let (timestamp, id) = stem.split_once('-')?;
    let taken_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    let id = Uuid::parse_str(id).ok()?;
    Some((taken_at, id))
}

/// Append-only snapshot history on the local filesystem
#[derive(Debug, Clone)]
pub struct FileBackupStore {
    root: PathBuf,
}

impl FileBackupStore {
    /// Create a store rooted at `root`; directories are created on first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn device_dir(&self, device: &str) -> PathBuf {
        self.root.join(escape_device(device))
    }

    /// Snapshot files of a device, sorted oldest first
    async fn entries(&self, device: &str) -> StoreResult<Vec<(DateTime<Utc>, Uuid, PathBuf)>> {
        let dir = self.device_dir(device);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            match parse_file_name(&name) {
                Some((taken_at, id)) => entries.push((taken_at, id, entry.path())),
                None => trace!(file = %name, "Skipping non-snapshot file"),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(entries)
    }

    async fn read_record(path: &Path) -> StoreResult<ConfigSnapshot> {
        let bytes = tokio::fs::read(path).await?;
        let record: SnapshotRecord =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(path, e.to_string()))?;
        if record.format != FORMAT_VERSION {
            return Err(corrupt(path, format!("unsupported format {}", record.format)));
        }
        let actual = record.snapshot.checksum();
        if actual != record.checksum {
            return Err(corrupt(
                path,
                format!("checksum mismatch: expected {}, found {}", record.checksum, actual),
            ));
        }
        Ok(record.snapshot)
    }
}

#[async_trait]
impl BackupStore for FileBackupStore {
    async fn save(&self, snapshot: &ConfigSnapshot) -> StoreResult<SnapshotHandle> {
        let dir = self.device_dir(&snapshot.device);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!(
            "{}-{}.json",
            snapshot.taken_at.format(TIMESTAMP_FORMAT),
            snapshot.id.simple()
        );
        let path = dir.join(&name);
        let tmp = dir.join(format!(".{}.tmp", name));

        let record = SnapshotRecord {
            format: FORMAT_VERSION,
            checksum: snapshot.checksum(),
            snapshot: snapshot.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| StoreError::Unavailable(format!("cannot encode snapshot: {}", e)))?;

        write_synced(&tmp, &bytes).await?;
        // A hard link never replaces an existing file, which keeps history append-only
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        linked.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StoreError::Rejected(format!("{} already exists", path.display()))
            } else {
                StoreError::from(e)
            }
        })?;
        sync_dir(&dir).await?;

        debug!(device = %snapshot.device, path = %path.display(), "Stored snapshot");
        Ok(SnapshotHandle {
            id: snapshot.id,
            device: snapshot.device.clone(),
            taken_at: snapshot.taken_at,
            location: path.display().to_string(),
        })
    }

    async fn load(&self, device: &str, at_or_before: DateTime<Utc>) -> StoreResult<ConfigSnapshot> {
        let entries = self.entries(device).await?;
        let (_, _, path) = entries
            .iter()
            .rev()
            .find(|(taken_at, _, _)| *taken_at <= at_or_before)
            .ok_or_else(|| StoreError::NotFound(device.to_string()))?;
        Self::read_record(path).await
    }

    async fn list(&self, device: &str) -> StoreResult<Vec<SnapshotHandle>> {
        Ok(self
            .entries(device)
            .await?
            .into_iter()
            .map(|(taken_at, id, path)| SnapshotHandle {
                id,
                device: device.to_string(),
                taken_at,
                location: path.display().to_string(),
            })
            .collect())
    }
}

/// Baselines stored as one JSON document per device
#[derive(Debug, Clone)]
pub struct FileBaselineRepository {
    root: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FileBaselineRepository {
    /// Create a repository rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    fn path(&self, device: &str) -> PathBuf {
        self.root.join(format!("{}.json", escape_device(device)))
    }

    async fn read(&self, device: &str) -> StoreResult<Baseline> {
        let path = self.path(device);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(device.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let record: BaselineRecord =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(&path, e.to_string()))?;
        if statements_checksum(&record.baseline.statements) != record.checksum {
            return Err(corrupt(&path, "checksum mismatch"));
        }
        Ok(record.baseline)
    }
}

#[async_trait]
impl BaselineRepository for FileBaselineRepository {
    async fn get(&self, device: &str) -> StoreResult<Baseline> {
        self.read(device).await
    }

    async fn promote(&self, device: &str, snapshot: &ConfigSnapshot) -> StoreResult<Baseline> {
        check_promotion(device, snapshot)?;
        let lock = self.locks.entry(device.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        let version = match self.read(device).await {
            Ok(current) => current.version + 1,
            Err(StoreError::NotFound(_)) => 1,
            Err(e) => return Err(e),
        };
        let baseline = Baseline::from_snapshot(snapshot, version);
        let record = BaselineRecord {
            format: FORMAT_VERSION,
            checksum: statements_checksum(&baseline.statements),
            baseline: baseline.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| StoreError::Unavailable(format!("cannot encode baseline: {}", e)))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path(device);
        let tmp = self.root.join(format!(
            ".{}.{}.tmp",
            escape_device(device),
            Uuid::new_v4().simple()
        ));
        write_synced(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        sync_dir(&self.root).await?;

        debug!(device = %device, version, "Promoted baseline");
        Ok(baseline)
    }
}
