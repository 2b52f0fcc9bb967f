//! Device inventory.
//!
//! The inventory is a YAML document listing connection targets:
//!
//! ```yaml
//! devices:
//!   - name: core-1
//!     host: 10.0.0.1
//!     device_type: cisco_ios
//!     username: netops
//!   - name: edge-7
//!     host: edge-7.example.net
//!     device_type: juniper_junos
//!     port: 830
//!     params:
//!       jump: bastion.example.net
//! ```
//!
//! Credentials are deliberately not part of a target; sessions obtain them
//! from the transport's own configuration. Any `password`/`secret` keys found
//! in the file are ignored with a warning.

use crate::network::Platform;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("device '{device}': unknown platform '{platform}'")]
    UnknownPlatform { device: String, platform: String },

    #[error("duplicate device: {0}")]
    DuplicateDevice(String),

    #[error("device entry {0} has neither a name nor a host")]
    MissingHost(usize),

    #[error("invalid device pattern: {0}")]
    InvalidPattern(String),
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// A device the engine can open a session to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTarget {
    /// Unique device identifier
    pub name: String,
    /// Address or DNS name used by the session adapter
    pub host: String,
    /// Platform tag selecting normalization and command set
    pub platform: Platform,
    /// Optional transport port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Optional login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Free-form adapter parameters
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, String>,
}

impl DeviceTarget {
    /// Create a target whose host is the same as its name
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        let name = name.into();
        Self {
            host: name.clone(),
            name,
            platform,
            port: None,
            username: None,
            params: IndexMap::new(),
        }
    }

    /// Set the host address
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

/// One `devices:` entry as written by operators.
#[derive(Debug, Deserialize)]
struct RawDevice {
    name: Option<String>,
    host: Option<String>,
    #[serde(alias = "platform")]
    device_type: String,
    port: Option<u16>,
    username: Option<String>,
    #[serde(default)]
    params: IndexMap<String, serde_yaml::Value>,
    password: Option<serde_yaml::Value>,
    secret: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawInventory {
    #[serde(default)]
    devices: Vec<RawDevice>,
}

/// The loaded device inventory, in file order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: IndexMap<String, DeviceTarget>,
    source: Option<PathBuf>,
}

impl Inventory {
    /// Load an inventory file
    pub fn load<P: AsRef<Path>>(path: P) -> InventoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut inventory = Self::from_yaml(&content)?;
        inventory.source = Some(path.to_path_buf());
        Ok(inventory)
    }

    /// Parse an inventory from YAML text
    pub fn from_yaml(content: &str) -> InventoryResult<Self> {
        let raw: RawInventory = serde_yaml::from_str(content)?;
        let mut devices = IndexMap::new();

        for (index, entry) in raw.devices.into_iter().enumerate() {
            let target = Self::convert(index, entry)?;
            if devices.contains_key(&target.name) {
                return Err(InventoryError::DuplicateDevice(target.name));
            }
            devices.insert(target.name.clone(), target);
        }

        Ok(Self {
            devices,
            source: None,
        })
    }

    /// Build an inventory from already constructed targets
    pub fn from_targets(targets: impl IntoIterator<Item = DeviceTarget>) -> InventoryResult<Self> {
        let mut devices = IndexMap::new();
        for target in targets {
            if devices.contains_key(&target.name) {
                return Err(InventoryError::DuplicateDevice(target.name));
            }
            devices.insert(target.name.clone(), target);
        }
        Ok(Self {
            devices,
            source: None,
        })
    }

    fn convert(index: usize, raw: RawDevice) -> InventoryResult<DeviceTarget> {
        let (name, host) = match (raw.name, raw.host) {
            (Some(name), Some(host)) => (name, host),
            (Some(name), None) => (name.clone(), name),
            (None, Some(host)) => (host.clone(), host),
            (None, None) => return Err(InventoryError::MissingHost(index)),
        };

        if raw.password.is_some() || raw.secret.is_some() {
            warn!(device = %name, "Ignoring credentials in inventory; configure them in the session transport");
        }

        let platform =
            raw.device_type
                .parse::<Platform>()
                .map_err(|_| InventoryError::UnknownPlatform {
                    device: name.clone(),
                    platform: raw.device_type.clone(),
                })?;

        let params = raw
            .params
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s,
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                (k, value)
            })
            .collect();

        Ok(DeviceTarget {
            name,
            host,
            platform,
            port: raw.port,
            username: raw.username,
            params,
        })
    }

    /// Source file, when loaded from disk
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Look up a device by identifier
    pub fn get(&self, name: &str) -> Option<&DeviceTarget> {
        self.devices.get(name)
    }

    /// All devices in file order
    pub fn devices(&self) -> impl Iterator<Item = &DeviceTarget> {
        self.devices.values()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the inventory is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Select devices matching a comma separated list of names or `*` globs.
    ///
    /// Returned targets keep inventory order.
    pub fn select(&self, pattern: &str) -> InventoryResult<Vec<DeviceTarget>> {
        let mut matchers = Vec::new();
        for part in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let regex = format!("^{}$", regex::escape(part).replace(r"\*", ".*"));
            matchers.push(
                Regex::new(&regex).map_err(|e| InventoryError::InvalidPattern(e.to_string()))?,
            );
        }

        let mut seen = HashSet::new();
        Ok(self
            .devices
            .values()
            .filter(|d| matchers.iter().any(|m| m.is_match(&d.name)))
            .filter(|d| seen.insert(d.name.clone()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"
devices:
  - name: core-1
    host: 10.0.0.1
    device_type: cisco_ios
    username: netops
    password: hunter2
  - host: leaf-1.example.net
    device_type: arista_eos
  - name: edge-7
    host: 10.0.7.1
    platform: junos
    port: 830
    params:
      jump: bastion
      retries: 3
"#;

    #[test]
    fn test_parse_inventory() {
        let inv = Inventory::from_yaml(INVENTORY).unwrap();
        assert_eq!(inv.len(), 3);

        let core = inv.get("core-1").unwrap();
        assert_eq!(core.platform, Platform::Ios);
        assert_eq!(core.username.as_deref(), Some("netops"));

        let leaf = inv.get("leaf-1.example.net").unwrap();
        assert_eq!(leaf.host, "leaf-1.example.net");
        assert_eq!(leaf.platform, Platform::Eos);

        let edge = inv.get("edge-7").unwrap();
        assert_eq!(edge.port, Some(830));
        assert_eq!(edge.params.get("retries").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        let yaml = "devices:\n  - name: sw1\n    device_type: hp_procurve\n";
        let err = Inventory::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, InventoryError::UnknownPlatform { .. }));
    }

    #[test]
    fn test_duplicate_device_is_rejected() {
        let yaml = "devices:\n  - name: sw1\n    device_type: ios\n  - name: sw1\n    device_type: eos\n";
        let err = Inventory::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateDevice(name) if name == "sw1"));
    }

    #[test]
    fn test_select_patterns() {
        let inv = Inventory::from_yaml(INVENTORY).unwrap();
        let selected: Vec<String> = inv
            .select("edge-*,core-1")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(selected, vec!["core-1", "edge-7"]);
        assert!(inv.select("nothing").unwrap().is_empty());
    }
}
