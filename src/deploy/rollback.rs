//! Restoring a device to its pre-change configuration.
//!
//! Two strategies are available:
//!
//! - [`RollbackStrategy::FullSnapshot`] re-applies every statement of the
//!   pre-change snapshot without reading the device first.
//! - [`RollbackStrategy::Delta`] reads the current configuration first and
//!   sends only what differs: removals for added statements and the
//!   pre-change lines for changed or removed ones.
//!
//! Re-sending statements cannot take away what the failed change added, so
//! after the restore commands the device is read again and any statement
//! missing from the pre-change snapshot is removed. The device is then
//! snapshotted once more and must match the pre-change snapshot exactly.
//! Only a confirmed restore counts as rolled back.

use crate::connection::CommandError;
use crate::drift::{DriftDetector, DriftEntry};
use crate::network::{render_commands, render_delta, render_removals, NetworkDevice};
use crate::snapshot::{ConfigSnapshot, Statement};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How a failed change is undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStrategy {
    #[default]
    FullSnapshot,
    Delta,
}

impl fmt::Display for RollbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackStrategy::FullSnapshot => f.write_str("full_snapshot"),
            RollbackStrategy::Delta => f.write_str("delta"),
        }
    }
}

impl FromStr for RollbackStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full" | "full_snapshot" | "snapshot" => Ok(RollbackStrategy::FullSnapshot),
            "delta" => Ok(RollbackStrategy::Delta),
            other => Err(format!("unknown rollback strategy '{}'", other)),
        }
    }
}

/// Errors from a rollback attempt.
#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("rollback commands failed: {0}")]
    Apply(#[source] CommandError),

    #[error("could not read the configuration after rollback: {0}")]
    Confirm(String),

    #[error("configuration still differs from the pre-change snapshot in {count} statement(s), first: {first}")]
    NotRestored { count: usize, first: String },
}

/// Commands that restore `pre` given the device's `current` configuration.
///
/// Without a current snapshot the full pre-change statement set is used.
pub fn rollback_commands(
    strategy: RollbackStrategy,
    pre: &ConfigSnapshot,
    current: Option<&ConfigSnapshot>,
    detector: &DriftDetector,
) -> Vec<String> {
    let current = match (strategy, current) {
        (RollbackStrategy::Delta, Some(current)) => current,
        _ => return render_commands(pre.platform, &pre.statements),
    };

    let mut remove: Vec<Statement> = Vec::new();
    let mut restore: Vec<Statement> = Vec::new();
    for entry in detector.compare(&current.statements, &pre.statements) {
        match &entry {
            DriftEntry::Added { path, .. } => remove.extend(current.get(path).cloned()),
            DriftEntry::Changed { path, .. } | DriftEntry::Removed { path, .. } => {
                restore.extend(pre.get(path).cloned())
            }
        }
    }
    render_delta(pre.platform, &remove, &restore)
}

/// Removals for statements `current` has that `pre` does not.
pub fn leftover_removals(
    pre: &ConfigSnapshot,
    current: &ConfigSnapshot,
    detector: &DriftDetector,
) -> Vec<String> {
    let added: Vec<Statement> = detector
        .compare(&current.statements, &pre.statements)
        .iter()
        .filter_map(|entry| match entry {
            DriftEntry::Added { path, .. } => current.get(path).cloned(),
            _ => None,
        })
        .collect();
    render_removals(pre.platform, &added)
}

/// Roll `device` back to `pre` and confirm it.
pub async fn restore(
    device: &NetworkDevice,
    pre: &ConfigSnapshot,
    strategy: RollbackStrategy,
    detector: &DriftDetector,
) -> Result<(), RollbackError> {
    let current = match strategy {
        RollbackStrategy::Delta => match device.snapshot().await {
            Ok(current) => Some(current),
            Err(e) => {
                warn!(device = %device.name(), error = %e, "Cannot read configuration for delta rollback, re-applying full snapshot");
                None
            }
        },
        RollbackStrategy::FullSnapshot => None,
    };

    let commands = rollback_commands(strategy, pre, current.as_ref(), detector);
    info!(
        device = %device.name(),
        strategy = %strategy,
        commands = commands.len(),
        "Rolling back"
    );
    if !commands.is_empty() {
        device.apply(&commands).await.map_err(RollbackError::Apply)?;
    }

    let mut after = read_back(device).await?;
    let removals = leftover_removals(pre, &after, detector);
    if !removals.is_empty() {
        info!(device = %device.name(), commands = removals.len(), "Removing statements added by the change");
        device.apply(&removals).await.map_err(RollbackError::Apply)?;
        after = read_back(device).await?;
    }

    let remaining = detector.compare(&after.statements, &pre.statements);
    if let Some(first) = remaining.first() {
        return Err(RollbackError::NotRestored {
            count: remaining.len(),
            first: first.to_string(),
        });
    }

    debug!(device = %device.name(), "Rollback confirmed");
    Ok(())
}

async fn read_back(device: &NetworkDevice) -> Result<ConfigSnapshot, RollbackError> {
    device
        .snapshot()
        .await
        .map_err(|e| RollbackError::Confirm(e.to_string()))
}
