//! File-backed store tests.
//!
//! Each test works in its own temporary directory.

use chrono::Duration;
use netdrift::network::Platform;
use netdrift::snapshot::{ConfigSnapshot, Statement};
use netdrift::store::{
    promote_latest, BackupStore, BaselineRepository, FileBackupStore, FileBaselineRepository,
    StoreError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn snapshot(device: &str, hostname: &str) -> ConfigSnapshot {
    ConfigSnapshot::new(
        device,
        Platform::Ios,
        vec![
            Statement::new("hostname", hostname),
            Statement::new("vlan/10/name", "SALES"),
        ],
    )
}

// ============================================================================
// Backups
// ============================================================================

#[tokio::test]
async fn test_save_list_and_latest() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());

    let first = snapshot("sw1", "old");
    let mut second = snapshot("sw1", "new");
    second.taken_at = first.taken_at + Duration::seconds(5);

    let h1 = store.save(&first).await.unwrap();
    let h2 = store.save(&second).await.unwrap();
    assert!(std::path::Path::new(&h1.location).exists());

    let handles = store.list("sw1").await.unwrap();
    assert_eq!(
        handles.iter().map(|h| h.id).collect::<Vec<_>>(),
        vec![h1.id, h2.id]
    );

    let latest = store.latest("sw1").await.unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.statements, second.statements);

    // Point-in-time lookup returns the older snapshot
    let earlier = store
        .load("sw1", first.taken_at + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(earlier.id, first.id);
}

#[tokio::test]
async fn test_unknown_device_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());

    assert!(store.list("sw9").await.unwrap().is_empty());
    assert_eq!(
        store.latest("sw9").await.unwrap_err(),
        StoreError::NotFound("sw9".to_string())
    );
}

#[tokio::test]
async fn test_history_is_append_only() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());
    let snap = snapshot("sw1", "a");

    store.save(&snap).await.unwrap();
    let err = store.save(&snap).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
    assert_eq!(store.list("sw1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tampered_snapshot_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());
    let handle = store.save(&snapshot("sw1", "core")).await.unwrap();

    let text = std::fs::read_to_string(&handle.location).unwrap();
    std::fs::write(&handle.location, text.replace("SALES", "MARKETING")).unwrap();

    let err = store.latest("sw1").await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_device_names_are_escaped() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());

    store.save(&snapshot("../evil", "x")).await.unwrap();
    // Nothing escapes the store root
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["%2E.%2Fevil".to_string()]);
    assert_eq!(store.list("../evil").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stray_files_are_ignored() {
    let dir = TempDir::new().unwrap();
    let store = FileBackupStore::new(dir.path());
    store.save(&snapshot("sw1", "a")).await.unwrap();
    std::fs::write(dir.path().join("sw1").join("notes.txt"), "hello").unwrap();

    assert_eq!(store.list("sw1").await.unwrap().len(), 1);
}

// ============================================================================
// Baselines
// ============================================================================

#[tokio::test]
async fn test_promotion_versions_persist() {
    let dir = TempDir::new().unwrap();
    let repo = FileBaselineRepository::new(dir.path());

    let first = repo.promote("sw1", &snapshot("sw1", "a")).await.unwrap();
    let second = repo.promote("sw1", &snapshot("sw1", "b")).await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);

    // A fresh repository over the same directory sees the same state
    let reopened = FileBaselineRepository::new(dir.path());
    let current = reopened.get("sw1").await.unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.statements, second.statements);
}

#[tokio::test]
async fn test_missing_baseline_is_not_found() {
    let dir = TempDir::new().unwrap();
    let repo = FileBaselineRepository::new(dir.path());
    assert_eq!(
        repo.get("sw1").await.unwrap_err(),
        StoreError::NotFound("sw1".to_string())
    );
}

#[tokio::test]
async fn test_promotion_of_foreign_snapshot_is_rejected() {
    let dir = TempDir::new().unwrap();
    let repo = FileBaselineRepository::new(dir.path());
    let err = repo.promote("sw2", &snapshot("sw1", "a")).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn test_tampered_baseline_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let repo = FileBaselineRepository::new(dir.path());
    repo.promote("sw1", &snapshot("sw1", "a")).await.unwrap();

    let path = dir.path().join("sw1.json");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("SALES", "GUEST")).unwrap();

    assert!(matches!(
        repo.get("sw1").await.unwrap_err(),
        StoreError::Corrupt { .. }
    ));
}

#[tokio::test]
async fn test_concurrent_promotions_get_distinct_versions() {
    let dir = TempDir::new().unwrap();
    let repo = FileBaselineRepository::new(dir.path());

    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.promote("sw1", &snapshot("sw1", &format!("h{}", i)))
                .await
                .unwrap()
                .version
        }));
    }
    let mut versions = Vec::new();
    for handle in handles {
        versions.push(handle.await.unwrap());
    }
    versions.sort_unstable();
    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_promote_latest_from_files() {
    let backups_dir = TempDir::new().unwrap();
    let baselines_dir = TempDir::new().unwrap();
    let backups = FileBackupStore::new(backups_dir.path());
    let baselines = FileBaselineRepository::new(baselines_dir.path());

    let snap = snapshot("sw1", "core");
    backups.save(&snap).await.unwrap();
    let baseline = promote_latest(&backups, &baselines, "sw1").await.unwrap();

    assert_eq!(baseline.version, 1);
    assert_eq!(baseline.source_snapshot, Some(snap.id));
    assert_eq!(baselines.get("sw1").await.unwrap().statements, snap.statements);
}
