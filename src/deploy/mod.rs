//! Safe deployment of configuration changes.
//!
//! A [`DeploymentBatch`] pairs each device's [`DeploymentPlan`] with its
//! connection target. The [`Orchestrator`] runs the batch: every device is
//! backed up, changed, verified against the expected post-change state and
//! rolled back when verification fails. Results come back as a
//! [`BatchReport`](crate::report::BatchReport) keyed by device.
//!
//! ```rust,ignore
//! use netdrift::deploy::{DeploymentBatch, Orchestrator, OrchestratorConfig};
//!
//! let batch = DeploymentBatch::uniform(&targets, "vlan 20\n name GUEST\n")?;
//! let orchestrator = Orchestrator::new(sessions, backups, baselines, OrchestratorConfig::default())?;
//! let report = orchestrator.deploy(batch).await;
//! println!("{}", report.summary());
//! ```

pub mod orchestrator;
pub mod plan;
pub mod result;
pub mod rollback;

pub use orchestrator::{Orchestrator, OrchestratorConfig, VerificationPolicy, DEFAULT_CONCURRENCY};
pub use plan::{DeploymentBatch, DeploymentPlan};
pub use result::{DeploymentResult, Outcome, Phase};
pub use rollback::{RollbackError, RollbackStrategy};
