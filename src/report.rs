//! Batch reports.
//!
//! Every batch operation returns a report value keyed by device identifier.
//! Reports serialize to JSON and render a human summary through `Display`.

use crate::deploy::{DeploymentResult, Outcome, Phase};
use crate::drift::{DriftOutcome, DriftReference};
use crate::snapshot::SnapshotHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Results of a deployment batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// The batch was cancelled or timed out
    pub cancelled: bool,
    pub results: BTreeMap<String, DeploymentResult>,
}

impl BatchReport {
    /// Counts by outcome plus every device that did not verify cleanly
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.results.len(),
            ..BatchSummary::default()
        };
        for result in self.results.values() {
            match result.outcome {
                Outcome::Verified => summary.verified += 1,
                Outcome::VerifiedWithWarnings => summary.verified_with_warnings += 1,
                Outcome::RolledBack => summary.rolled_back += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Cancelled => summary.cancelled += 1,
            }
            if result.indeterminate {
                summary.indeterminate += 1;
            }
            if !result.outcome.is_verified() {
                summary.attention.push(AttentionItem {
                    device: result.device.clone(),
                    outcome: result.outcome,
                    phase_reached: result.phase_reached,
                    detail: result
                        .error
                        .clone()
                        .or_else(|| result.warnings.first().cloned())
                        .unwrap_or_default(),
                });
            }
        }
        summary
    }

    /// Every device verified without warnings
    pub fn all_verified(&self) -> bool {
        self.results.values().all(|r| r.outcome.is_verified())
    }

    /// Results of devices that did not verify cleanly
    pub fn non_verified(&self) -> impl Iterator<Item = &DeploymentResult> {
        self.results.values().filter(|r| !r.outcome.is_verified())
    }

    /// Result of one device
    pub fn get(&self, device: &str) -> Option<&DeploymentResult> {
        self.results.get(device)
    }

    /// Process exit code: 0 when everything verified, 2 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_verified() {
            0
        } else {
            2
        }
    }
}

/// A device needing operator attention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionItem {
    pub device: String,
    pub outcome: Outcome,
    pub phase_reached: Phase,
    pub detail: String,
}

/// Outcome counts of a deployment batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub verified: usize,
    pub verified_with_warnings: usize,
    pub rolled_back: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Failed devices whose configuration is unknown
    pub indeterminate: usize,
    pub attention: Vec<AttentionItem>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} device(s): {} verified, {} with warnings, {} rolled back, {} failed, {} cancelled",
            self.total,
            self.verified,
            self.verified_with_warnings,
            self.rolled_back,
            self.failed,
            self.cancelled
        )?;
        if self.attention.is_empty() {
            return Ok(());
        }
        writeln!(f, "{} device(s) need attention:", self.attention.len())?;
        for item in &self.attention {
            write!(f, "  {} [{} at {}]", item.device, item.outcome, item.phase_reached)?;
            if !item.detail.is_empty() {
                write!(f, " {}", item.detail)?;
            }
            writeln!(f)?;
        }
        if self.indeterminate > 0 {
            writeln!(
                f,
                "WARNING: {} device(s) are in an indeterminate state",
                self.indeterminate
            )?;
        }
        Ok(())
    }
}

/// Per-device result of a backup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Saved {
        handle: SnapshotHandle,
        statements: usize,
    },
    Failed {
        error: String,
    },
    Cancelled,
}

/// Results of a backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: BTreeMap<String, BackupOutcome>,
}

impl BackupReport {
    /// Number of stored snapshots
    pub fn saved(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, BackupOutcome::Saved { .. }))
            .count()
    }

    /// Devices without a stored snapshot
    pub fn failed_devices(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, o)| !matches!(o, BackupOutcome::Saved { .. }))
            .map(|(d, _)| d.as_str())
            .collect()
    }

    /// 0 when every device was backed up, 2 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.saved() == self.results.len() {
            0
        } else {
            2
        }
    }
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} of {} device(s) backed up", self.saved(), self.results.len())?;
        for (device, outcome) in &self.results {
            match outcome {
                BackupOutcome::Saved { .. } => {}
                BackupOutcome::Failed { error } => writeln!(f, "  {} failed: {}", device, error)?,
                BackupOutcome::Cancelled => writeln!(f, "  {} cancelled", device)?,
            }
        }
        Ok(())
    }
}

/// Counts of a drift run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub in_sync: usize,
    pub drifted: usize,
    pub unassessed: usize,
    pub failed: usize,
    #[serde(default)]
    pub cancelled: usize,
}

/// Results of a drift assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub reference: DriftReference,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: BTreeMap<String, DriftOutcome>,
}

impl DriftReport {
    pub fn summary(&self) -> DriftSummary {
        let mut summary = DriftSummary::default();
        for outcome in self.results.values() {
            match outcome {
                DriftOutcome::Assessed(record) if record.has_drift() => summary.drifted += 1,
                DriftOutcome::Assessed(_) => summary.in_sync += 1,
                DriftOutcome::Unassessed { .. } => summary.unassessed += 1,
                DriftOutcome::Failed { .. } => summary.failed += 1,
                DriftOutcome::Cancelled { .. } => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Devices that drifted from the reference
    pub fn drifted(&self) -> impl Iterator<Item = &DriftOutcome> {
        self.results.values().filter(|o| o.has_drift())
    }

    /// 0 in sync, 1 drift found, 2 when a device failed or was cancelled
    /// before it could be assessed
    pub fn exit_code(&self) -> i32 {
        let summary = self.summary();
        if summary.failed > 0 || summary.cancelled > 0 {
            2
        } else if summary.drifted > 0 {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for DriftSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in sync, {} drifted, {} unassessed, {} failed",
            self.in_sync, self.drifted, self.unassessed, self.failed
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{DriftEntry, DriftRecord, ReferenceInfo};

    fn result(device: &str, outcome: Outcome, phase: Phase, error: Option<&str>) -> DeploymentResult {
        let now = Utc::now();
        DeploymentResult {
            device: device.to_string(),
            outcome,
            phase_reached: phase,
            error: error.map(String::from),
            warnings: vec![],
            unexpected: vec![],
            pre_snapshot: None,
            post_snapshot: None,
            rollback_attempted: false,
            indeterminate: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn batch(results: Vec<DeploymentResult>) -> BatchReport {
        BatchReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            cancelled: false,
            results: results.into_iter().map(|r| (r.device.clone(), r)).collect(),
        }
    }

    #[test]
    fn test_summary_lists_non_verified_devices() {
        let report = batch(vec![
            result("sw1", Outcome::Verified, Phase::Verified, None),
            result("sw2", Outcome::Failed, Phase::Pending, Some("connection failed")),
            result("sw3", Outcome::RolledBack, Phase::Verifying, Some("1 unexpected difference(s)")),
        ]);
        let summary = report.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rolled_back, 1);
        assert_eq!(
            summary.attention.iter().map(|a| a.device.as_str()).collect::<Vec<_>>(),
            vec!["sw2", "sw3"]
        );
        assert!(!report.all_verified());
        assert_eq!(report.exit_code(), 2);

        let text = summary.to_string();
        assert!(text.contains("2 device(s) need attention"));
        assert!(text.contains("sw2 [failed at pending] connection failed"));
    }

    #[test]
    fn test_all_verified() {
        let report = batch(vec![result("sw1", Outcome::Verified, Phase::Verified, None)]);
        assert!(report.all_verified());
        assert_eq!(report.exit_code(), 0);
        assert!(report.summary().attention.is_empty());
    }

    #[test]
    fn test_drift_summary() {
        let record = |entries: Vec<DriftEntry>| DriftRecord {
            device: "sw1".to_string(),
            assessed_at: Utc::now(),
            reference: ReferenceInfo {
                kind: DriftReference::Baseline,
                version: Some(1),
                captured_at: Utc::now(),
            },
            entries,
        };
        let mut results = BTreeMap::new();
        results.insert("sw1".to_string(), DriftOutcome::Assessed(record(vec![])));
        results.insert(
            "sw2".to_string(),
            DriftOutcome::Assessed(record(vec![DriftEntry::Added {
                path: "vlan/20/name".into(),
                body: "GUEST".to_string(),
            }])),
        );
        results.insert(
            "sw3".to_string(),
            DriftOutcome::Unassessed {
                device: "sw3".to_string(),
                reason: "no baseline has been promoted".to_string(),
            },
        );
        let report = DriftReport {
            reference: DriftReference::Baseline,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results,
        };
        let summary = report.summary();
        assert_eq!(
            summary,
            DriftSummary {
                in_sync: 1,
                drifted: 1,
                unassessed: 1,
                failed: 0,
                cancelled: 0,
            }
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_cancelled_drift_is_counted_apart_from_failures() {
        let mut results = BTreeMap::new();
        results.insert(
            "sw1".to_string(),
            DriftOutcome::Cancelled {
                device: "sw1".to_string(),
            },
        );
        let report = DriftReport {
            reference: DriftReference::Baseline,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results,
        };
        let summary = report.summary();
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(
            summary.to_string(),
            "0 in sync, 0 drifted, 0 unassessed, 0 failed, 1 cancelled"
        );
    }
}
