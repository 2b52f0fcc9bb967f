//! Deployment plans and batches.

use crate::drift::Assertion;
use crate::error::{Error, Result};
use crate::inventory::DeviceTarget;
use crate::network::{parse_deletions, parse_statements, ParseError, Platform};
use crate::snapshot::StatementKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Commands to send to one device and the state they should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Target device identifier
    pub device: String,
    /// Configuration-mode commands, sent in order
    pub commands: Vec<String>,
    /// Expected effect of the commands
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl DeploymentPlan {
    /// Plan with explicit commands and no assertions
    pub fn new<I, S>(device: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device: device.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            assertions: Vec::new(),
        }
    }

    /// Add an assertion
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Build a plan from configuration text.
    ///
    /// Blank lines and `#`/`!` comment lines are dropped. The assertions are
    /// derived by normalizing the commands themselves, so `vlan 20` /
    /// ` name GUEST` asserts `vlan/20/name = GUEST`, `no ip domain-lookup`
    /// asserts the negation and a Junos `delete` asserts absence.
    pub fn from_config_text(
        device: impl Into<String>,
        platform: Platform,
        text: &str,
    ) -> std::result::Result<Self, ParseError> {
        let commands = command_lines(text);
        let (deletions, rest): (Vec<&String>, Vec<&String>) = commands
            .iter()
            .partition(|line| line.trim_start().starts_with("delete "));

        let statements = if rest.is_empty() {
            Vec::new()
        } else {
            let body = rest
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            match parse_statements(platform, &body) {
                Ok(statements) => statements,
                Err(ParseError::Empty) => Vec::new(),
                Err(e) => return Err(e),
            }
        };

        let mut assertions: Vec<Assertion> = statements
            .into_iter()
            .map(|s| match s.kind {
                StatementKind::Negated => Assertion::absent(s.path),
                _ => Assertion::Present {
                    path: s.path,
                    body: s.body,
                },
            })
            .collect();

        let deleted = deletions
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assertions.extend(
            parse_deletions(platform, &deleted)
                .into_iter()
                .map(Assertion::absent),
        );

        Ok(Self {
            device: device.into(),
            commands,
            assertions,
        })
    }

    /// Read a command file and build a plan from it
    pub fn from_file(device: &str, platform: Platform, path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_config_text(device, platform, &text).map_err(|e| Error::parse(device, e))
    }
}

/// Non-blank, non-comment lines with their indentation kept.
fn command_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with('!')
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// Validated set of plans paired with their connection targets.
#[derive(Debug, Clone)]
pub struct DeploymentBatch {
    entries: Vec<(DeviceTarget, DeploymentPlan)>,
}

impl DeploymentBatch {
    /// Pair plans with targets.
    ///
    /// Fails before any device is touched when there are no plans, when a
    /// device has more than one plan, or when a plan names a device with no
    /// target.
    pub fn new(targets: &[DeviceTarget], plans: Vec<DeploymentPlan>) -> Result<Self> {
        if plans.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(plans.len());
        for plan in plans {
            if !seen.insert(plan.device.clone()) {
                return Err(Error::DuplicateDevice(plan.device));
            }
            let target = targets
                .iter()
                .find(|t| t.name == plan.device)
                .cloned()
                .ok_or_else(|| Error::UnknownDevice(plan.device.clone()))?;
            entries.push((target, plan));
        }
        Ok(Self { entries })
    }

    /// The same configuration text planned for every target.
    pub fn uniform(targets: &[DeviceTarget], config_text: &str) -> Result<Self> {
        let plans = targets
            .iter()
            .map(|t| {
                DeploymentPlan::from_config_text(&t.name, t.platform, config_text)
                    .map_err(|e| Error::parse(&t.name, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(targets, plans)
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch is empty (never true for a constructed batch)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device identifiers in submission order
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.name.as_str())
    }

    /// Plans in submission order
    pub fn plans(&self) -> impl Iterator<Item = &DeploymentPlan> {
        self.entries.iter().map(|(_, p)| p)
    }

    pub(crate) fn into_entries(self) -> Vec<(DeviceTarget, DeploymentPlan)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StatementPath;
    use pretty_assertions::assert_eq;

    fn targets() -> Vec<DeviceTarget> {
        vec![
            DeviceTarget::new("sw1", Platform::Ios),
            DeviceTarget::new("sw2", Platform::Eos),
        ]
    }

    #[test]
    fn test_plan_from_ios_commands() {
        let text = "\
! add the guest vlan
vlan 20
 name GUEST

interface GigabitEthernet0/2
 no shutdown
";
        let plan = DeploymentPlan::from_config_text("sw1", Platform::Ios, text).unwrap();
        assert_eq!(
            plan.commands,
            vec!["vlan 20", " name GUEST", "interface GigabitEthernet0/2", " no shutdown"]
        );
        assert!(plan
            .assertions
            .contains(&Assertion::present("vlan/20/name", "GUEST")));
        assert!(plan.assertions.contains(&Assertion::Absent {
            path: StatementPath::new(["interface", "GigabitEthernet0/2", "shutdown"])
        }));
    }

    #[test]
    fn test_plan_from_junos_set_commands() {
        let text = "set vlans GUEST vlan-id 20\ndelete vlans OLD\n";
        let plan = DeploymentPlan::from_config_text("mx1", Platform::Junos, text).unwrap();
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(
            plan.assertions,
            vec![
                Assertion::Present {
                    path: StatementPath::new(["vlans", "GUEST", "vlan-id"]),
                    body: "20".to_string()
                },
                Assertion::absent(StatementPath::new(["vlans", "OLD"])),
            ]
        );
    }

    #[test]
    fn test_junos_delete_only_plan() {
        let plan =
            DeploymentPlan::from_config_text("mx1", Platform::Junos, "delete vlans OLD\n").unwrap();
        assert_eq!(plan.assertions.len(), 1);
    }

    #[test]
    fn test_batch_rejects_empty_and_duplicates() {
        assert!(matches!(
            DeploymentBatch::new(&targets(), vec![]),
            Err(Error::EmptyBatch)
        ));

        let plans = vec![
            DeploymentPlan::new("sw1", ["hostname a"]),
            DeploymentPlan::new("sw1", ["hostname b"]),
        ];
        assert!(matches!(
            DeploymentBatch::new(&targets(), plans),
            Err(Error::DuplicateDevice(d)) if d == "sw1"
        ));
    }

    #[test]
    fn test_batch_rejects_unknown_device() {
        let plans = vec![DeploymentPlan::new("sw9", ["hostname a"])];
        assert!(matches!(
            DeploymentBatch::new(&targets(), plans),
            Err(Error::UnknownDevice(d)) if d == "sw9"
        ));
    }

    #[test]
    fn test_uniform_batch() {
        let batch = DeploymentBatch::uniform(&targets(), "vlan 30\n name LAB\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.devices().collect::<Vec<_>>(), vec!["sw1", "sw2"]);
    }
}
