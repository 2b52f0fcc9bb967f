//! Batch orchestration: one worker per device, bounded concurrency.
//!
//! Every device runs the same state machine on its own task:
//!
//! ```text
//! Pending -> BackedUp -> Applying -> Applied -> Verifying -> Verified
//!                |           |                      |
//!        Failed / Cancelled  RolledBack / Failed   RolledBack / VerifiedWithWarnings
//! ```
//!
//! Workers never share a session and only meet again when the batch joins.
//! Any error inside a worker becomes part of that device's result; the batch
//! itself only fails on invalid input, before any device is contacted.

use super::plan::{DeploymentBatch, DeploymentPlan};
use super::result::{DeploymentResult, DeviceRun, Outcome, Phase};
use super::rollback::{self, RollbackStrategy};
use crate::connection::{ConnectionResult, SessionFactory};
use crate::drift::{DriftDetector, DriftEntry, DriftOutcome, DriftReference, ExpectedState};
use crate::error::{Error, Result};
use crate::inventory::DeviceTarget;
use crate::network::NetworkDevice;
use crate::report::{BackupOutcome, BackupReport, BatchReport, DriftReport};
use crate::snapshot::ConfigSnapshot;
use crate::store::{BackupStore, BaselineRepository, StoreError};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Default number of devices worked on at the same time
pub const DEFAULT_CONCURRENCY: usize = 5;

/// What happens when the post-change configuration differs from the
/// expected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPolicy {
    /// Roll back
    #[default]
    Strict,
    /// Keep the change and report it as verified with warnings
    Lenient,
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationPolicy::Strict => f.write_str("strict"),
            VerificationPolicy::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for VerificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(VerificationPolicy::Strict),
            "lenient" => Ok(VerificationPolicy::Lenient),
            other => Err(format!("unknown verification policy '{}'", other)),
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum devices worked on at once (at least 1)
    pub concurrency: usize,
    /// Cancel the batch after this long
    pub batch_timeout: Option<Duration>,
    pub rollback: RollbackStrategy,
    pub verification: VerificationPolicy,
    /// Persist the running configuration once a device verified
    pub save_after_verify: bool,
    /// Regexes over rendered statement paths excluded from drift and
    /// verification
    pub ignore_patterns: Vec<String>,
    /// Store the snapshots taken for drift assessment as backups
    pub persist_drift_snapshots: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_timeout: None,
            rollback: RollbackStrategy::default(),
            verification: VerificationPolicy::default(),
            save_after_verify: false,
            ignore_patterns: Vec::new(),
            persist_drift_snapshots: true,
        }
    }
}

/// Why a worker produced no result of its own
#[derive(Debug, Clone)]
enum Skip {
    Cancelled,
    Panicked(String),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Cancelled => f.write_str("cancelled before the device was started"),
            Skip::Panicked(message) => write!(f, "device worker panicked: {}", message),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Aborts the batch timer when the batch completes first
struct TimeoutGuard(Option<JoinHandle<()>>);

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Runs backups, drift assessments and deployments across devices.
#[derive(Clone)]
pub struct Orchestrator {
    sessions: Arc<dyn SessionFactory>,
    backups: Arc<dyn BackupStore>,
    baselines: Arc<dyn BaselineRepository>,
    detector: Arc<DriftDetector>,
    config: Arc<OrchestratorConfig>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator; fails on an invalid ignore pattern.
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        backups: Arc<dyn BackupStore>,
        baselines: Arc<dyn BaselineRepository>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let detector = DriftDetector::with_ignore_patterns(&config.ignore_patterns)
            .map_err(|e| Error::invalid_config("deployment.ignore_paths", e.to_string()))?;
        Ok(Self {
            sessions,
            backups,
            baselines,
            detector: Arc::new(detector),
            config: Arc::new(config),
        })
    }

    /// Settings in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Detector used for drift and verification
    pub fn detector(&self) -> &DriftDetector {
        &self.detector
    }

    /// Deploy a batch and wait for every device to finish.
    pub async fn deploy(&self, batch: DeploymentBatch) -> BatchReport {
        self.deploy_with_cancel(batch, CancellationToken::new()).await
    }

    /// Deploy a batch, stopping early when `cancel` fires.
    ///
    /// In-flight devices finish the step they are in and then stop; devices
    /// not yet started are reported as cancelled at `Pending`.
    pub async fn deploy_with_cancel(
        &self,
        batch: DeploymentBatch,
        cancel: CancellationToken,
    ) -> BatchReport {
        let started_at = Utc::now();
        let token = cancel.child_token();
        let _timer = self.arm_timeout(&token);

        info!(
            devices = batch.len(),
            concurrency = self.config.concurrency,
            rollback = %self.config.rollback,
            verification = %self.config.verification,
            "Starting deployment batch"
        );

        let work = batch
            .into_entries()
            .into_iter()
            .map(|(target, plan)| {
                let this = self.clone();
                let token = token.clone();
                let name = target.name.clone();
                let job = async move { this.deploy_device(target, plan, token).await };
                (name, job.boxed())
            })
            .collect();

        let results = self
            .fan_out(work, &token, |device, skip| {
                let outcome = match skip {
                    Skip::Cancelled => Outcome::Cancelled,
                    Skip::Panicked(_) => Outcome::Failed,
                };
                DeploymentResult::not_run(device, outcome, skip.to_string())
            })
            .await;

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            cancelled: token.is_cancelled(),
            results,
        };
        let summary = report.summary();
        info!(
            verified = summary.verified,
            attention = summary.attention.len(),
            "Deployment batch finished"
        );
        report
    }

    /// Capture and store a snapshot of every target.
    pub async fn backup_all(&self, targets: &[DeviceTarget]) -> Result<BackupReport> {
        validate_targets(targets)?;
        let started_at = Utc::now();
        let token = CancellationToken::new();
        let _timer = self.arm_timeout(&token);

        info!(devices = targets.len(), "Starting backup");
        let work = targets
            .iter()
            .cloned()
            .map(|target| {
                let this = self.clone();
                let name = target.name.clone();
                (name, async move { this.backup_device(target).await }.boxed())
            })
            .collect();

        let results = self
            .fan_out(work, &token, |_, skip| match skip {
                Skip::Cancelled => BackupOutcome::Cancelled,
                Skip::Panicked(_) => BackupOutcome::Failed {
                    error: skip.to_string(),
                },
            })
            .await;

        Ok(BackupReport {
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    /// Compare the live configuration of every target with a reference.
    pub async fn assess_drift(
        &self,
        targets: &[DeviceTarget],
        reference: DriftReference,
    ) -> Result<DriftReport> {
        validate_targets(targets)?;
        let started_at = Utc::now();
        let token = CancellationToken::new();
        let _timer = self.arm_timeout(&token);

        info!(devices = targets.len(), reference = %reference, "Starting drift assessment");
        let work = targets
            .iter()
            .cloned()
            .map(|target| {
                let this = self.clone();
                let name = target.name.clone();
                (name, async move { this.assess_device(target, reference).await }.boxed())
            })
            .collect();

        let results = self
            .fan_out(work, &token, |device, skip| match skip {
                Skip::Cancelled => DriftOutcome::Cancelled {
                    device: device.to_string(),
                },
                Skip::Panicked(_) => DriftOutcome::Failed {
                    device: device.to_string(),
                    error: skip.to_string(),
                },
            })
            .await;

        Ok(DriftReport {
            reference,
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    /// Run one job per device under the concurrency limit and join them.
    async fn fan_out<T>(
        &self,
        work: Vec<(String, BoxFuture<'static, T>)>,
        cancel: &CancellationToken,
        skipped: fn(&str, Skip) -> T,
    ) -> BTreeMap<String, T>
    where
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(work.len());

        for (device, job) in work {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let span = info_span!("device", device = %device);
            let name = device.clone();

            let handle = tokio::spawn(
                async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return skipped(&name, Skip::Cancelled),
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return skipped(&name, Skip::Cancelled),
                        },
                    };
                    job.await
                }
                .instrument(span),
            );
            handles.push((device, handle));
        }

        let mut results = BTreeMap::new();
        for (device, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(device = %device, error = %e, "Device worker did not complete");
                    skipped(&device, Skip::Panicked(e.to_string()))
                }
            };
            results.insert(device, result);
        }
        results
    }

    fn arm_timeout(&self, token: &CancellationToken) -> TimeoutGuard {
        TimeoutGuard(self.config.batch_timeout.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(timeout = ?limit, "Batch timeout reached, cancelling");
                token.cancel();
            })
        }))
    }

    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<NetworkDevice> {
        let session = self.sessions.open(target).await?;
        let device = NetworkDevice::new(&target.name, target.platform, session);
        device.prepare().await;
        Ok(device)
    }

    async fn close(&self, device: &NetworkDevice) -> Option<String> {
        match device.close().await {
            Ok(()) => None,
            Err(e) => {
                warn!(device = %device.name(), error = %e, "Failed to close session");
                Some(format!("session close failed: {}", e))
            }
        }
    }

    /// Open, snapshot and close. A full capture also collects the startup
    /// configuration and interface state.
    ///
    /// The session is closed even when the capture panics; the panic is
    /// then resumed so the worker reports it.
    async fn capture(&self, target: &DeviceTarget, full: bool) -> Result<ConfigSnapshot> {
        let device = self.open(target).await?;
        let snapshot = AssertUnwindSafe(async {
            if full {
                device.backup().await
            } else {
                device.snapshot().await
            }
        })
        .catch_unwind()
        .await;
        self.close(&device).await;
        match snapshot {
            Ok(snapshot) => snapshot,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn backup_device(&self, target: DeviceTarget) -> BackupOutcome {
        let snapshot = match self.capture(&target, true).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Backup failed");
                return BackupOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.backups.save(&snapshot).await {
            Ok(handle) => {
                info!(statements = snapshot.statements.len(), location = %handle.location, "Backup stored");
                BackupOutcome::Saved {
                    handle,
                    statements: snapshot.statements.len(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Backup could not be stored");
                BackupOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn assess_device(&self, target: DeviceTarget, reference: DriftReference) -> DriftOutcome {
        let failed = |error: String| DriftOutcome::Failed {
            device: target.name.clone(),
            error,
        };

        let current = match self.capture(&target, false).await {
            Ok(snapshot) => snapshot,
            Err(e) => return failed(e.to_string()),
        };

        let outcome = match reference {
            DriftReference::Baseline => {
                match self.detector.assess(&current, self.baselines.as_ref()).await {
                    Ok(outcome) => outcome,
                    Err(e) => failed(e.to_string()),
                }
            }
            DriftReference::PreviousBackup => match self.backups.latest(&target.name).await {
                Ok(previous) => DriftOutcome::Assessed(self.detector.diff_snapshots(&current, &previous)),
                Err(StoreError::NotFound(_)) => DriftOutcome::Unassessed {
                    device: target.name.clone(),
                    reason: "no previous backup".to_string(),
                },
                Err(e) => failed(e.to_string()),
            },
        };

        // Saved after the lookup so a snapshot is never compared with itself
        if self.config.persist_drift_snapshots {
            if let Err(e) = self.backups.save(&current).await {
                warn!(error = %e, "Drift snapshot could not be stored");
            }
        }

        if let Some(record) = outcome.record() {
            let (added, changed, removed) = record.counts();
            info!(added, changed, removed, "Drift assessed");
        }
        outcome
    }

    async fn deploy_device(
        &self,
        target: DeviceTarget,
        plan: DeploymentPlan,
        cancel: CancellationToken,
    ) -> DeploymentResult {
        let mut run = DeviceRun::new(&target.name);
        if cancel.is_cancelled() {
            run.fail(Skip::Cancelled.to_string());
            return run.finish(Outcome::Cancelled);
        }

        let device = match self.open(&target).await {
            Ok(device) => device,
            Err(e) => {
                warn!(error = %e, "Could not open session");
                run.fail(format!("connection failed: {}", e));
                return run.finish(Outcome::Failed);
            }
        };

        let driven = AssertUnwindSafe(self.drive(&device, &plan, &cancel, &mut run))
            .catch_unwind()
            .await;
        let outcome = match driven {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(phase = %run.phase(), panic = %message, "Device worker panicked");
                run.indeterminate = run.phase() >= Phase::Applying;
                run.fail(Skip::Panicked(message).to_string());
                Outcome::Failed
            }
        };
        if let Some(warning) = self.close(&device).await {
            run.warn(warning);
        }
        run.finish(outcome)
    }

    /// The per-device state machine, from an open session to a terminal
    /// outcome.
    async fn drive(
        &self,
        device: &NetworkDevice,
        plan: &DeploymentPlan,
        cancel: &CancellationToken,
        run: &mut DeviceRun,
    ) -> Outcome {
        // Backup failures are reported at BackedUp, the phase that did not
        // complete
        let pre = match device.backup().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                run.advance(Phase::BackedUp);
                run.fail(format!("pre-change backup failed: {}", e));
                return Outcome::Failed;
            }
        };
        match self.backups.save(&pre).await {
            Ok(handle) => run.pre_snapshot = Some(handle),
            Err(e) => {
                run.advance(Phase::BackedUp);
                run.fail(format!("pre-change backup failed: could not be stored: {}", e));
                return Outcome::Failed;
            }
        }
        run.advance(Phase::BackedUp);
        if cancel.is_cancelled() {
            run.fail("cancelled before apply");
            return Outcome::Cancelled;
        }

        run.advance(Phase::Applying);
        if let Err(e) = device.apply(&plan.commands).await {
            warn!(error = %e, "Apply failed");
            return self
                .roll_back(device, &pre, run, format!("apply failed: {}", e))
                .await;
        }
        run.advance(Phase::Applied);
        if cancel.is_cancelled() {
            run.fail("cancelled after apply, configuration left unverified");
            return Outcome::Cancelled;
        }

        run.advance(Phase::Verifying);
        let expected = ExpectedState::derive(&pre, &plan.assertions);
        let post = match device.snapshot().await {
            Ok(post) => post,
            Err(e) => {
                let reason = format!("post-change configuration could not be read: {}", e);
                return self.unconfirmed(device, &pre, run, reason, Vec::new()).await;
            }
        };
        match self.backups.save(&post).await {
            Ok(handle) => run.post_snapshot = Some(handle),
            Err(e) => run.warn(format!("post-change snapshot could not be stored: {}", e)),
        }

        let unexpected = self.detector.verify(&post, &expected);
        if !unexpected.is_empty() {
            let reason = format!("{} unexpected difference(s) after apply", unexpected.len());
            return self.unconfirmed(device, &pre, run, reason, unexpected).await;
        }
        run.advance(Phase::Verified);

        if self.config.save_after_verify {
            if let Err(e) = device.save().await {
                run.warn(format!("configuration verified but not saved: {}", e));
            }
        }

        if run.warnings.is_empty() {
            Outcome::Verified
        } else {
            Outcome::VerifiedWithWarnings
        }
    }

    /// Verification did not confirm the change; apply the policy.
    async fn unconfirmed(
        &self,
        device: &NetworkDevice,
        pre: &ConfigSnapshot,
        run: &mut DeviceRun,
        reason: String,
        unexpected: Vec<DriftEntry>,
    ) -> Outcome {
        run.unexpected = unexpected;
        match self.config.verification {
            VerificationPolicy::Strict => self.roll_back(device, pre, run, reason).await,
            VerificationPolicy::Lenient => {
                warn!(reason = %reason, "Keeping unverified change");
                run.warn(reason);
                Outcome::VerifiedWithWarnings
            }
        }
    }

    async fn roll_back(
        &self,
        device: &NetworkDevice,
        pre: &ConfigSnapshot,
        run: &mut DeviceRun,
        reason: String,
    ) -> Outcome {
        run.rollback_attempted = true;
        match rollback::restore(device, pre, self.config.rollback, &self.detector).await {
            Ok(()) => {
                info!(phase = %run.phase(), "Rolled back");
                run.fail(reason);
                Outcome::RolledBack
            }
            Err(e) => {
                error!(phase = %run.phase(), error = %e, "Rollback failed, device state is indeterminate");
                run.indeterminate = true;
                run.fail(format!(
                    "{}; rollback failed: {}; device is in an indeterminate state",
                    reason, e
                ));
                Outcome::Failed
            }
        }
    }
}

/// Reject empty target lists and duplicate identifiers.
fn validate_targets(targets: &[DeviceTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(Error::EmptyBatch);
    }
    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.name.as_str()) {
            return Err(Error::DuplicateDevice(target.name.clone()));
        }
    }
    Ok(())
}
