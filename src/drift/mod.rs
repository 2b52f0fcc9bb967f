//! Drift detection.
//!
//! A [`DriftDetector`] compares two statement sets keyed by path and reports
//! every difference as a [`DriftEntry`]. The same comparison serves three
//! purposes:
//!
//! - drift assessment of a live snapshot against the device's baseline,
//! - comparison against the previous backup,
//! - post-change verification against an [`ExpectedState`].
//!
//! Entries are ordered by path, and for equal paths Added < Changed < Removed,
//! so records are deterministic and can be compared directly.

mod expected;

pub use expected::{Assertion, ExpectedState};

use crate::snapshot::{body_map, Baseline, ConfigSnapshot, Statement, StatementPath};
use crate::store::{BaselineRepository, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// One difference between a current and a reference statement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum DriftEntry {
    /// Present now, absent from the reference
    Added { path: StatementPath, body: String },
    /// Present in both with different bodies
    Changed {
        path: StatementPath,
        old: String,
        new: String,
    },
    /// Present in the reference, absent now
    Removed { path: StatementPath, body: String },
}

impl DriftEntry {
    /// Path the entry refers to
    pub fn path(&self) -> &StatementPath {
        match self {
            DriftEntry::Added { path, .. }
            | DriftEntry::Changed { path, .. }
            | DriftEntry::Removed { path, .. } => path,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DriftEntry::Added { .. } => 0,
            DriftEntry::Changed { .. } => 1,
            DriftEntry::Removed { .. } => 2,
        }
    }

    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            DriftEntry::Added { .. } => "added",
            DriftEntry::Changed { .. } => "changed",
            DriftEntry::Removed { .. } => "removed",
        }
    }
}

impl Ord for DriftEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path()
            .cmp(other.path())
            .then_with(|| self.rank().cmp(&other.rank()))
            .then_with(|| format!("{:?}", self).cmp(&format!("{:?}", other)))
    }
}

impl PartialOrd for DriftEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DriftEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftEntry::Added { path, body } => write!(f, "+ {} = {}", path, body),
            DriftEntry::Changed { path, old, new } => {
                write!(f, "~ {}: {} -> {}", path, old, new)
            }
            DriftEntry::Removed { path, body } => write!(f, "- {} = {}", path, body),
        }
    }
}

/// What a drift assessment compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriftReference {
    /// The device's promoted baseline
    #[default]
    Baseline,
    /// The most recent earlier backup of the device
    PreviousBackup,
}

impl fmt::Display for DriftReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftReference::Baseline => write!(f, "baseline"),
            DriftReference::PreviousBackup => write!(f, "previous backup"),
        }
    }
}

/// The reference a record was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    pub kind: DriftReference,
    /// Baseline version, for baseline comparisons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// When the reference was promoted or captured
    pub captured_at: DateTime<Utc>,
}

/// Differences of one device against a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub device: String,
    pub assessed_at: DateTime<Utc>,
    pub reference: ReferenceInfo,
    pub entries: Vec<DriftEntry>,
}

impl DriftRecord {
    /// Whether any difference was found
    pub fn has_drift(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Counts of (added, changed, removed) entries
    pub fn counts(&self) -> (usize, usize, usize) {
        self.entries
            .iter()
            .fold((0, 0, 0), |(a, c, r), entry| match entry {
                DriftEntry::Added { .. } => (a + 1, c, r),
                DriftEntry::Changed { .. } => (a, c + 1, r),
                DriftEntry::Removed { .. } => (a, c, r + 1),
            })
    }
}

/// Result of assessing one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftOutcome {
    /// Compared against a reference
    Assessed(DriftRecord),
    /// No reference exists yet; this is not drift
    Unassessed { device: String, reason: String },
    /// The device could not be captured or the reference could not be read
    Failed { device: String, error: String },
    /// The run was cancelled before the device was assessed
    Cancelled { device: String },
}

impl DriftOutcome {
    /// Device the outcome belongs to
    pub fn device(&self) -> &str {
        match self {
            DriftOutcome::Assessed(record) => &record.device,
            DriftOutcome::Unassessed { device, .. }
            | DriftOutcome::Failed { device, .. }
            | DriftOutcome::Cancelled { device } => device,
        }
    }

    /// Whether the device was assessed and differs from its reference
    pub fn has_drift(&self) -> bool {
        matches!(self, DriftOutcome::Assessed(record) if record.has_drift())
    }

    /// The drift record, if the device was assessed
    pub fn record(&self) -> Option<&DriftRecord> {
        match self {
            DriftOutcome::Assessed(record) => Some(record),
            _ => None,
        }
    }
}

/// Compares statement sets.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    ignore: Vec<Regex>,
}

impl DriftDetector {
    /// Detector that reports every difference
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that skips paths matching any of `patterns`.
    ///
    /// Patterns are matched against the `/` separated path, e.g.
    /// `^ntp/clock-period`.
    pub fn with_ignore_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignore = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignore })
    }

    /// Whether a path is excluded from comparison
    pub fn is_ignored(&self, path: &StatementPath) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        let rendered = path.to_string();
        self.ignore.iter().any(|r| r.is_match(&rendered))
    }

    fn compare_maps(
        &self,
        current: &BTreeMap<&StatementPath, &str>,
        reference: &BTreeMap<&StatementPath, &str>,
    ) -> Vec<DriftEntry> {
        let mut entries = Vec::new();

        for (path, body) in current {
            match reference.get(path) {
                None => entries.push(DriftEntry::Added {
                    path: (*path).clone(),
                    body: body.to_string(),
                }),
                Some(old) if old != body => entries.push(DriftEntry::Changed {
                    path: (*path).clone(),
                    old: old.to_string(),
                    new: body.to_string(),
                }),
                Some(_) => {}
            }
        }
        for (path, body) in reference {
            if !current.contains_key(path) {
                entries.push(DriftEntry::Removed {
                    path: (*path).clone(),
                    body: body.to_string(),
                });
            }
        }

        entries.retain(|e| !self.is_ignored(e.path()));
        entries.sort();
        entries
    }

    /// Differences of `current` relative to `reference`
    pub fn compare(&self, current: &[Statement], reference: &[Statement]) -> Vec<DriftEntry> {
        self.compare_maps(&body_map(current), &body_map(reference))
    }

    /// Drift of a snapshot against a baseline
    pub fn diff(&self, current: &ConfigSnapshot, baseline: &Baseline) -> DriftRecord {
        DriftRecord {
            device: current.device.clone(),
            assessed_at: Utc::now(),
            reference: ReferenceInfo {
                kind: DriftReference::Baseline,
                version: Some(baseline.version),
                captured_at: baseline.promoted_at,
            },
            entries: self.compare(&current.statements, &baseline.statements),
        }
    }

    /// Drift of a snapshot against an earlier snapshot
    pub fn diff_snapshots(&self, current: &ConfigSnapshot, previous: &ConfigSnapshot) -> DriftRecord {
        DriftRecord {
            device: current.device.clone(),
            assessed_at: Utc::now(),
            reference: ReferenceInfo {
                kind: DriftReference::PreviousBackup,
                version: None,
                captured_at: previous.taken_at,
            },
            entries: self.compare(&current.statements, &previous.statements),
        }
    }

    /// Assess a snapshot against the device's baseline.
    ///
    /// A missing baseline is reported as [`DriftOutcome::Unassessed`], never
    /// as drift.
    pub async fn assess(
        &self,
        current: &ConfigSnapshot,
        baselines: &dyn BaselineRepository,
    ) -> StoreResult<DriftOutcome> {
        match baselines.get(&current.device).await {
            Ok(baseline) => Ok(DriftOutcome::Assessed(self.diff(current, &baseline))),
            Err(StoreError::NotFound(_)) => Ok(DriftOutcome::Unassessed {
                device: current.device.clone(),
                reason: "no baseline has been promoted".to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Entries of a post-change snapshot the expected state does not explain
    pub fn verify(&self, post: &ConfigSnapshot, expected: &ExpectedState) -> Vec<DriftEntry> {
        let reference = expected.body_map();
        let mut entries = self.compare_maps(&post.body_map(), &reference);
        entries.retain(|e| !expected.explains(e));
        entries
    }
}
