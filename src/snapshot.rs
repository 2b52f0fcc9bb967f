//! Normalized configuration snapshots.
//!
//! A [`ConfigSnapshot`] is the vendor-neutral form of a device's running
//! configuration: a set of [`Statement`]s keyed by their hierarchical
//! [`StatementPath`], plus the facts reported by the device. Backups also
//! carry the startup configuration and interface state when the device
//! reports them. Snapshots are never mutated after capture; baselines and
//! drift records are derived from them.

use crate::network::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Body recorded for a statement that is present without a value
pub const FLAG_SET: &str = "enabled";

/// Body recorded for an explicitly negated statement (`no shutdown`)
pub const FLAG_NEGATED: &str = "disabled";

/// Hierarchical identity of a statement, e.g. `interface/Gi0/1/description`.
///
/// Paths order segment by segment, so a section sorts directly before its
/// own children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementPath(Vec<String>);

impl StatementPath {
    /// Create a path from its segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a `/` separated path.
    ///
    /// Interface names containing `/` cannot be recovered from their display
    /// form, so this is meant for paths written by hand in tests and ignore
    /// lists rather than for round-tripping arbitrary paths.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Path segments
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` equals `prefix` or lies underneath it
    pub fn starts_with(&self, prefix: &StatementPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether `self` lies strictly underneath `ancestor`
    pub fn is_descendant_of(&self, ancestor: &StatementPath) -> bool {
        self.0.len() > ancestor.0.len() && self.starts_with(ancestor)
    }

    /// Append a segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for StatementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for StatementPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// How a statement appeared in the device output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Keyword followed by a value (`description Uplink`)
    #[default]
    Setting,
    /// Keyword with no value (`spanning-tree portfast`)
    Flag,
    /// Explicit negation (`no shutdown`)
    Negated,
    /// Header of a nested block (`interface Gi0/1`)
    Section,
}

/// One normalized configuration statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Stable identity used for comparison
    pub path: StatementPath,
    /// Value compared for equality (a setting's value or a flag marker)
    pub body: String,
    /// Statement shape, used when rendering commands back to the device
    #[serde(default)]
    pub kind: StatementKind,
    /// Enclosing section headers, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    /// Leading keyword tokens as the device prints them
    #[serde(default)]
    pub keyword: String,
}

impl Statement {
    /// A top-level setting whose keyword is its whole path
    pub fn new(path: impl Into<StatementPath>, body: impl Into<String>) -> Self {
        let path = path.into();
        let keyword = path.segments().join(" ");
        Self {
            path,
            body: body.into(),
            kind: StatementKind::Setting,
            parents: Vec::new(),
            keyword,
        }
    }

    /// Whether this statement is a flag, negation or section marker
    pub fn is_marker(&self) -> bool {
        !matches!(self.kind, StatementKind::Setting)
    }

    /// The statement as a configuration line relative to its parents
    pub fn config_line(&self, negation: &str) -> String {
        match self.kind {
            StatementKind::Setting if self.keyword.starts_with("banner") => {
                format!("{} ^C{}^C", self.keyword, self.body)
            }
            StatementKind::Setting => format!("{} {}", self.keyword, self.body),
            StatementKind::Flag | StatementKind::Section => self.keyword.clone(),
            StatementKind::Negated => format!("{} {}", negation, self.keyword),
        }
    }
}

/// Administrative and operational state of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    /// Not administratively shut down
    pub enabled: bool,
    /// Line protocol / link is up
    pub up: bool,
}

/// Immutable normalized capture of one device's running configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Unique snapshot identifier
    pub id: Uuid,
    /// Device identifier
    pub device: String,
    /// Device platform
    pub platform: Platform,
    /// Capture time
    pub taken_at: DateTime<Utc>,
    /// Statements, sorted by path and unique per path
    pub statements: Vec<Statement>,
    /// Device facts (version, model, serial)
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
    /// Normalized startup configuration, when it was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Vec<Statement>>,
    /// Interface state by interface name, when it was captured
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceState>,
}

impl ConfigSnapshot {
    /// Create a snapshot taken now.
    ///
    /// Statements are sorted by path; callers are expected to have
    /// deduplicated them already.
    pub fn new(device: impl Into<String>, platform: Platform, mut statements: Vec<Statement>) -> Self {
        statements.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            platform,
            taken_at: Utc::now(),
            statements,
            facts: BTreeMap::new(),
            startup: None,
            interfaces: BTreeMap::new(),
        }
    }

    /// Attach device facts
    pub fn with_facts(mut self, facts: BTreeMap<String, String>) -> Self {
        self.facts = facts;
        self
    }

    /// Attach the normalized startup configuration
    pub fn with_startup(mut self, mut startup: Vec<Statement>) -> Self {
        startup.sort_by(|a, b| a.path.cmp(&b.path));
        self.startup = Some(startup);
        self
    }

    /// Attach interface state
    pub fn with_interfaces(mut self, interfaces: BTreeMap<String, InterfaceState>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Whether the running configuration differs from the startup
    /// configuration. `None` when no startup configuration was captured.
    pub fn unsaved_changes(&self) -> Option<bool> {
        self.startup
            .as_ref()
            .map(|startup| body_map(startup) != self.body_map())
    }

    /// Look up a statement by path
    pub fn get(&self, path: &StatementPath) -> Option<&Statement> {
        self.statements
            .binary_search_by(|s| s.path.cmp(path))
            .ok()
            .map(|i| &self.statements[i])
    }

    /// Path to body map used for comparison
    pub fn body_map(&self) -> BTreeMap<&StatementPath, &str> {
        body_map(&self.statements)
    }

    /// SHA-256 over the canonical `path\tbody` lines of the statements
    pub fn checksum(&self) -> String {
        statements_checksum(&self.statements)
    }
}

/// Path to body map over any statement slice; a later duplicate wins.
pub fn body_map(statements: &[Statement]) -> BTreeMap<&StatementPath, &str> {
    statements
        .iter()
        .map(|s| (&s.path, s.body.as_str()))
        .collect()
}

/// Content checksum of a statement set, independent of input order.
pub fn statements_checksum(statements: &[Statement]) -> String {
    let mut hasher = Sha256::new();
    for (path, body) in body_map(statements) {
        hasher.update(path.to_string().as_bytes());
        hasher.update(b"\t");
        hasher.update(body.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Reference to a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHandle {
    /// Snapshot identifier
    pub id: Uuid,
    /// Device identifier
    pub device: String,
    /// Capture time of the referenced snapshot
    pub taken_at: DateTime<Utc>,
    /// Store specific location (file path, memory key)
    pub location: String,
}

impl fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

/// The approved intended configuration of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// Device identifier
    pub device: String,
    /// Monotonically increasing per device, starting at 1
    pub version: u64,
    /// Time of promotion
    pub promoted_at: DateTime<Utc>,
    /// Snapshot the baseline was promoted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_snapshot: Option<Uuid>,
    /// Approved statements
    pub statements: Vec<Statement>,
}

impl Baseline {
    /// Build a baseline from a snapshot
    pub fn from_snapshot(snapshot: &ConfigSnapshot, version: u64) -> Self {
        Self {
            device: snapshot.device.clone(),
            version,
            promoted_at: Utc::now(),
            source_snapshot: Some(snapshot.id),
            statements: snapshot.statements.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display_and_order() {
        let section = StatementPath::new(["vlan", "10"]);
        let child = section.child("name");
        let other = StatementPath::new(["vlan", "100"]);

        assert_eq!(child.to_string(), "vlan/10/name");
        assert!(section < child);
        assert!(child < other);
        assert!(child.is_descendant_of(&section));
        assert!(!section.is_descendant_of(&section));
        assert!(section.starts_with(&section));
    }

    #[test]
    fn test_unsaved_changes() {
        let running = vec![Statement::new("hostname", "sw1"), Statement::new("vlan/10/name", "SALES")];
        let snapshot = ConfigSnapshot::new("sw1", Platform::Ios, running.clone());
        assert_eq!(snapshot.unsaved_changes(), None);

        let mut reversed = running.clone();
        reversed.reverse();
        assert_eq!(snapshot.clone().with_startup(reversed).unsaved_changes(), Some(false));

        let saved = vec![Statement::new("hostname", "sw1")];
        assert_eq!(snapshot.with_startup(saved).unsaved_changes(), Some(true));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            StatementPath::parse("router/bgp/65000"),
            StatementPath::new(["router", "bgp", "65000"])
        );
    }

    #[test]
    fn test_config_line() {
        let mut stmt = Statement::new("description", "Uplink");
        assert_eq!(stmt.config_line("no"), "description Uplink");

        stmt.kind = StatementKind::Negated;
        stmt.keyword = "shutdown".to_string();
        assert_eq!(stmt.config_line("no"), "no shutdown");
    }

    #[test]
    fn test_snapshot_sorted_lookup() {
        let snapshot = ConfigSnapshot::new(
            "sw1",
            Platform::Ios,
            vec![
                Statement::new("vlan/20/name", "GUEST"),
                Statement::new("hostname", "sw1"),
                Statement::new("vlan/10/name", "SALES"),
            ],
        );
        assert_eq!(snapshot.statements[0].path.to_string(), "hostname");
        assert_eq!(
            snapshot.get(&StatementPath::parse("vlan/20/name")).map(|s| s.body.as_str()),
            Some("GUEST")
        );
        assert!(snapshot.get(&StatementPath::parse("vlan/30/name")).is_none());
    }

    #[test]
    fn test_checksum_is_order_independent() {
        let a = vec![Statement::new("a", "1"), Statement::new("b", "2")];
        let b = vec![Statement::new("b", "2"), Statement::new("a", "1")];
        assert_eq!(statements_checksum(&a), statements_checksum(&b));
        assert_ne!(
            statements_checksum(&a),
            statements_checksum(&[Statement::new("a", "1")])
        );
    }

    #[test]
    fn test_baseline_from_snapshot() {
        let snapshot = ConfigSnapshot::new("sw1", Platform::Eos, vec![Statement::new("hostname", "sw1")]);
        let baseline = Baseline::from_snapshot(&snapshot, 3);
        assert_eq!(baseline.version, 3);
        assert_eq!(baseline.source_snapshot, Some(snapshot.id));
        assert_eq!(baseline.statements, snapshot.statements);
    }
}
