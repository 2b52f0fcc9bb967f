//! # netdrift - Configuration Backup, Drift Detection and Safe Deployment
//!
//! netdrift keeps track of what a fleet of switches and routers is running
//! and changes it carefully. It works on normalized configuration: raw CLI
//! output from IOS, EOS, NX-OS and Junos devices is turned into a sorted set
//! of statements addressed by path, so two configurations can be compared
//! without caring about vendor formatting.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: Normalized statements plus device facts captured at one instant
//! - **Backups**: An append-only history of snapshots per device
//! - **Baselines**: The promoted, versioned "should be" configuration of a device
//! - **Drift**: Added, changed and removed statements against a reference
//! - **Deployments**: Backup, apply, verify and roll back, per device, in parallel
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │              (backup, drift, deploy, promote)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Orchestrator                                │
//! │     (one worker per device, bounded concurrency, cancellation)       │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │   Normalizer    │   │   Drift Detector    │   │   Backup Store /    │
//! │ (per-platform   │   │ (diff, expected     │   │   Baseline Repo     │
//! │   dialects)     │   │  post-state)        │   │  (file or memory)   │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Device Session Adapter                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netdrift::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let inventory = Inventory::load("devices.yml")?;
//!     let targets: Vec<_> = inventory.devices().cloned().collect();
//!
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(CommandSessionFactory::new("ssh {host} {command}")?),
//!         Arc::new(FileBackupStore::new("backups")),
//!         Arc::new(FileBaselineRepository::new("baselines")),
//!         OrchestratorConfig::default(),
//!     )?;
//!
//!     let batch = DeploymentBatch::uniform(&targets, "vlan 20\n name GUEST\n")?;
//!     let report = orchestrator.deploy(batch).await;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::connection::{
        CommandError, CommandSessionFactory, ConnectionError, DeviceSession, SessionFactory,
    };
    pub use crate::deploy::{
        DeploymentBatch, DeploymentPlan, DeploymentResult, Orchestrator, OrchestratorConfig,
        Outcome, Phase, RollbackStrategy, VerificationPolicy,
    };
    pub use crate::drift::{
        Assertion, DriftDetector, DriftEntry, DriftOutcome, DriftRecord, DriftReference,
        ExpectedState,
    };
    pub use crate::error::{Error, Result};
    pub use crate::inventory::{DeviceTarget, Inventory};
    pub use crate::network::{normalize, Platform};
    pub use crate::report::{BackupReport, BatchReport, BatchSummary, DriftReport};
    pub use crate::snapshot::{Baseline, ConfigSnapshot, SnapshotHandle, Statement, StatementPath};
    pub use crate::store::{
        BackupStore, BaselineRepository, FileBackupStore, FileBaselineRepository,
        MemoryBackupStore, MemoryBaselineRepository, StoreError,
    };
}

/// Error types and result aliases.
pub mod error;

/// Layered configuration file support.
pub mod config;

/// Device session adapters.
///
/// The [`DeviceSession`](connection::DeviceSession) trait is the only way
/// netdrift talks to a device; [`CommandSessionFactory`](connection::CommandSessionFactory)
/// runs each command through a configurable shell command line.
pub mod connection;

/// YAML inventory of device targets.
pub mod inventory;

/// Platforms, normalization and command rendering.
pub mod network;

/// Snapshot, statement and baseline data model.
pub mod snapshot;

/// Backup store and baseline repository.
pub mod store;

/// Drift detection and expected post-change state.
pub mod drift;

/// Deployment plans, orchestration and rollback.
pub mod deploy;

/// Batch reports.
pub mod report;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
