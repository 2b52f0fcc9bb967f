//! Per-device deployment state and results.

use crate::drift::DriftEntry;
use crate::snapshot::SnapshotHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Furthest step a device deployment reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    BackedUp,
    Applying,
    Applied,
    Verifying,
    Verified,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Pending => "pending",
            Phase::BackedUp => "backed-up",
            Phase::Applying => "applying",
            Phase::Applied => "applied",
            Phase::Verifying => "verifying",
            Phase::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Terminal state of a device deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Applied and the post-change configuration matched expectations
    Verified,
    /// Applied, but verification found differences or could not complete
    /// and the lenient policy accepted it
    VerifiedWithWarnings,
    /// The change was undone and the device confirmed back at its
    /// pre-change configuration
    RolledBack,
    /// The deployment failed; see the error and the indeterminate flag
    Failed,
    /// Stopped by cancellation or the batch timeout
    Cancelled,
}

impl Outcome {
    /// Verified cleanly
    pub fn is_verified(&self) -> bool {
        matches!(self, Outcome::Verified)
    }

    /// Label used in summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Verified => "verified",
            Outcome::VerifiedWithWarnings => "verified-with-warnings",
            Outcome::RolledBack => "rolled-back",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of deploying a plan to one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub device: String,
    pub outcome: Outcome,
    pub phase_reached: Phase,
    /// Why the device did not verify cleanly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Post-change differences the plan did not account for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unexpected: Vec<DriftEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_snapshot: Option<SnapshotHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_snapshot: Option<SnapshotHandle>,
    /// A rollback was started
    #[serde(default)]
    pub rollback_attempted: bool,
    /// The device configuration is unknown: rollback failed or could not be
    /// confirmed
    #[serde(default)]
    pub indeterminate: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentResult {
    /// A result for a device whose worker never ran to a terminal state.
    pub(crate) fn not_run(device: &str, outcome: Outcome, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            device: device.to_string(),
            outcome,
            phase_reached: Phase::Pending,
            error: Some(error.into()),
            warnings: Vec::new(),
            unexpected: Vec::new(),
            pre_snapshot: None,
            post_snapshot: None,
            rollback_attempted: false,
            indeterminate: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Outcome plus phase, e.g. `rolled-back at verifying`
    pub fn status_line(&self) -> String {
        match self.outcome {
            Outcome::Verified => self.outcome.to_string(),
            _ => format!("{} at {}", self.outcome, self.phase_reached),
        }
    }
}

/// Mutable per-device record kept by the worker while it runs.
pub(crate) struct DeviceRun {
    device: String,
    phase: Phase,
    started_at: DateTime<Utc>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub unexpected: Vec<DriftEntry>,
    pub pre_snapshot: Option<SnapshotHandle>,
    pub post_snapshot: Option<SnapshotHandle>,
    pub rollback_attempted: bool,
    pub indeterminate: bool,
}

impl DeviceRun {
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            phase: Phase::Pending,
            started_at: Utc::now(),
            error: None,
            warnings: Vec::new(),
            unexpected: Vec::new(),
            pre_snapshot: None,
            post_snapshot: None,
            rollback_attempted: false,
            indeterminate: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase);
        info!(device = %self.device, from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(device = %self.device, warning = %message, "Deployment warning");
        self.warnings.push(message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn finish(self, outcome: Outcome) -> DeploymentResult {
        info!(
            device = %self.device,
            outcome = %outcome,
            phase = %self.phase,
            "Deployment finished"
        );
        DeploymentResult {
            device: self.device,
            outcome,
            phase_reached: self.phase,
            error: self.error,
            warnings: self.warnings,
            unexpected: self.unexpected,
            pre_snapshot: self.pre_snapshot,
            post_snapshot: self.post_snapshot,
            rollback_attempted: self.rollback_attempted,
            indeterminate: self.indeterminate,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Pending < Phase::BackedUp);
        assert!(Phase::Applied < Phase::Verifying);
        assert_eq!(Phase::BackedUp.to_string(), "backed-up");
    }

    #[test]
    fn test_run_records_phase_reached() {
        let mut run = DeviceRun::new("sw1");
        run.advance(Phase::BackedUp);
        run.advance(Phase::Applying);
        run.fail("apply failed");
        let result = run.finish(Outcome::RolledBack);
        assert_eq!(result.phase_reached, Phase::Applying);
        assert_eq!(result.status_line(), "rolled-back at applying");
        assert_eq!(result.error.as_deref(), Some("apply failed"));
    }

    #[test]
    fn test_result_serializes_outcome() {
        let result = DeploymentResult::not_run("sw1", Outcome::Cancelled, "cancelled");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "cancelled");
        assert_eq!(json["phase_reached"], "pending");
    }
}
