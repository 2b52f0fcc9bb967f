use super::DriftEntry;
use crate::snapshot::{ConfigSnapshot, StatementPath, FLAG_NEGATED, FLAG_SET};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A statement-level claim about the configuration after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assert", rename_all = "snake_case")]
pub enum Assertion {
    /// The path must exist with exactly this body
    Present { path: StatementPath, body: String },
    /// The path and everything underneath it must be gone
    Absent { path: StatementPath },
}

impl Assertion {
    /// Assert a path is present with a body
    pub fn present(path: impl Into<StatementPath>, body: impl Into<String>) -> Self {
        Self::Present {
            path: path.into(),
            body: body.into(),
        }
    }

    /// Assert a path is absent
    pub fn absent(path: impl Into<StatementPath>) -> Self {
        Self::Absent { path: path.into() }
    }

    /// Path the assertion is about
    pub fn path(&self) -> &StatementPath {
        match self {
            Assertion::Present { path, .. } | Assertion::Absent { path } => path,
        }
    }
}

/// The configuration a device should have after a plan was applied: the
/// pre-change snapshot with the plan's assertions laid over it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedState {
    statements: BTreeMap<StatementPath, String>,
    asserted_present: Vec<StatementPath>,
    asserted_absent: Vec<StatementPath>,
}

impl ExpectedState {
    /// Apply `assertions` in order on top of `pre`.
    pub fn derive(pre: &ConfigSnapshot, assertions: &[Assertion]) -> Self {
        let mut state = Self {
            statements: pre
                .statements
                .iter()
                .map(|s| (s.path.clone(), s.body.clone()))
                .collect(),
            ..Self::default()
        };

        for assertion in assertions {
            match assertion {
                Assertion::Present { path, body } => {
                    state.statements.insert(path.clone(), body.clone());
                    state.asserted_present.push(path.clone());
                }
                Assertion::Absent { path } => {
                    state.statements.retain(|p, _| !p.starts_with(path));
                    state.asserted_present.retain(|p| !p.starts_with(path));
                    state.asserted_absent.push(path.clone());
                }
            }
        }
        state
    }

    /// Expected body at a path
    pub fn get(&self, path: &StatementPath) -> Option<&str> {
        self.statements.get(path).map(String::as_str)
    }

    /// Number of expected statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether no statements are expected
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub(crate) fn body_map(&self) -> BTreeMap<&StatementPath, &str> {
        self.statements
            .iter()
            .map(|(p, b)| (p, b.as_str()))
            .collect()
    }

    /// Differences that follow from how devices print what was asserted.
    ///
    /// A section header that encloses an asserted path may appear without
    /// being asserted itself (Junos `set` commands never name their blocks),
    /// and a device may print an explicit negation for a path asserted
    /// absent (`no shutdown`).
    pub(crate) fn explains(&self, entry: &DriftEntry) -> bool {
        match entry {
            DriftEntry::Added { path, body } if body == FLAG_SET => self
                .asserted_present
                .iter()
                .any(|asserted| asserted.is_descendant_of(path)),
            DriftEntry::Added { path, body } if body == FLAG_NEGATED => self
                .asserted_absent
                .iter()
                .any(|absent| path.starts_with(absent)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Platform;
    use crate::snapshot::Statement;

    fn pre() -> ConfigSnapshot {
        ConfigSnapshot::new(
            "sw1",
            Platform::Ios,
            vec![
                Statement::new("hostname", "sw1"),
                Statement::new("vlan/10", FLAG_SET),
                Statement::new("vlan/10/name", "SALES"),
            ],
        )
    }

    #[test]
    fn test_present_overrides_pre_state() {
        let state = ExpectedState::derive(
            &pre(),
            &[
                Assertion::present("vlan/10/name", "MARKETING"),
                Assertion::present("vlan/20/name", "GUEST"),
            ],
        );
        assert_eq!(state.get(&"vlan/10/name".into()), Some("MARKETING"));
        assert_eq!(state.get(&"vlan/20/name".into()), Some("GUEST"));
        assert_eq!(state.get(&"hostname".into()), Some("sw1"));
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn test_absent_removes_descendants() {
        let state = ExpectedState::derive(&pre(), &[Assertion::absent("vlan/10")]);
        assert_eq!(state.get(&"vlan/10".into()), None);
        assert_eq!(state.get(&"vlan/10/name".into()), None);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_implied_sections_are_explained() {
        let state = ExpectedState::derive(&pre(), &[Assertion::present("vlans/GUEST/vlan-id", "20")]);
        assert!(state.explains(&DriftEntry::Added {
            path: "vlans/GUEST".into(),
            body: FLAG_SET.into()
        }));
        assert!(!state.explains(&DriftEntry::Added {
            path: "vlans/OTHER".into(),
            body: FLAG_SET.into()
        }));
    }

    #[test]
    fn test_printed_negation_is_explained() {
        let state = ExpectedState::derive(&pre(), &[Assertion::absent("interface/Gi0/1/shutdown")]);
        assert!(state.explains(&DriftEntry::Added {
            path: "interface/Gi0/1/shutdown".into(),
            body: FLAG_NEGATED.into()
        }));
    }
}
