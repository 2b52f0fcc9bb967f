//! Device platform types and their CLI command sets.
//!
//! Every vendor-specific decision in the engine (which command prints the
//! running configuration, how configuration mode is entered, how a device
//! reports a rejected command) is answered by [`Platform`], so callers never
//! branch on raw device-type strings.

use crate::connection::CommandError;
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Supported network device platforms.
///
/// Each variant selects one normalization strategy and one command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    /// Cisco IOS / IOS-XE / IOS-XR (line oriented, one-space indentation)
    Ios,
    /// Arista EOS (line oriented, three-space indentation)
    Eos,
    /// Cisco NX-OS (line oriented, two-space indentation)
    Nxos,
    /// Juniper Junos (hierarchical braces or `set` statements)
    Junos,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "cisco_ios"),
            Platform::Eos => write!(f, "arista_eos"),
            Platform::Nxos => write!(f, "cisco_nxos"),
            Platform::Junos => write!(f, "juniper_junos"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cisco_ios" | "ios" | "cisco_xe" | "ios_xe" | "iosxe" | "cisco_xr" | "iosxr"
            | "ios_xr" => Ok(Platform::Ios),
            "arista_eos" | "eos" | "arista" => Ok(Platform::Eos),
            "cisco_nxos" | "nxos" | "nexus" => Ok(Platform::Nxos),
            "juniper_junos" | "junos" | "juniper" => Ok(Platform::Junos),
            _ => Err(Error::UnknownPlatform(s.to_string())),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.to_string()
    }
}

/// Settings whose trailing tokens are a value rather than part of the
/// statement's identity. `ip address 10.0.0.1 255.255.255.0` becomes the
/// path `ip/address` with the address as its body, while statements not
/// listed here (`ntp server 10.0.0.5`) are identified by all of their tokens.
const LINE_ORIENTED_KEYED: &[&[&str]] = &[
    &["hostname"],
    &["description"],
    &["name"],
    &["ip", "address"],
    &["ip", "domain-name"],
    &["ip", "domain", "name"],
    &["ip", "default-gateway"],
    &["ip", "vrf", "forwarding"],
    &["vrf", "forwarding"],
    &["switchport", "mode"],
    &["switchport", "access", "vlan"],
    &["switchport", "voice", "vlan"],
    &["switchport", "trunk", "native", "vlan"],
    &["switchport", "trunk", "allowed", "vlan"],
    &["switchport", "trunk", "encapsulation"],
    &["spanning-tree", "mode"],
    &["channel-group"],
    &["encapsulation"],
    &["mtu"],
    &["speed"],
    &["duplex"],
    &["bandwidth"],
    &["state"],
    &["version"],
    &["router-id"],
    &["remote-as"],
    &["update-source"],
    &["snmp-server", "location"],
    &["snmp-server", "contact"],
    &["clock", "timezone"],
    &["logging", "buffered"],
    &["exec-timeout"],
    &["transport", "input"],
];

const NXOS_EXTRA_KEYED: &[&[&str]] = &[&["vrf", "member"], &["peer-keepalive", "destination"]];

const JUNOS_KEYED: &[&[&str]] = &[
    &["host-name"],
    &["description"],
    &["vlan-id"],
    &["mtu"],
    &["speed"],
    &["interface-mode"],
    &["port-mode"],
    &["native-vlan-id"],
    &["router-id"],
    &["autonomous-system"],
    &["peer-as"],
    &["local-as"],
    &["local-address"],
    &["l3-interface"],
    &["time-zone"],
    &["location"],
    &["contact"],
    &["version"],
    &["encrypted-password"],
];

impl Platform {
    /// All supported platforms
    pub fn all() -> [Platform; 4] {
        [Platform::Ios, Platform::Eos, Platform::Nxos, Platform::Junos]
    }

    /// Whether the platform prints configuration as indented lines
    pub fn is_line_oriented(&self) -> bool {
        !matches!(self, Platform::Junos)
    }

    /// Command that prints the running configuration
    pub fn show_running_config(&self) -> &'static str {
        match self {
            Platform::Junos => "show configuration",
            _ => "show running-config",
        }
    }

    /// Command that prints version and hardware facts
    pub fn show_version(&self) -> &'static str {
        "show version"
    }

    /// Command that prints the configuration the device boots with.
    ///
    /// Junos boots from its committed configuration, which is what `show
    /// configuration` already prints, so the rescue configuration is kept
    /// as the fallback copy instead.
    pub fn show_startup_config(&self) -> &'static str {
        match self {
            Platform::Junos => "show system configuration rescue",
            _ => "show startup-config",
        }
    }

    /// Command that prints a one-line summary per interface
    pub fn show_interfaces(&self) -> &'static str {
        match self {
            Platform::Junos => "show interfaces terse",
            _ => "show ip interface brief",
        }
    }

    /// Commands that make command output machine friendly (no paging)
    pub fn prepare_session(&self) -> Vec<String> {
        match self {
            Platform::Junos => vec!["set cli screen-length 0".to_string()],
            Platform::Nxos => vec!["terminal length 0".to_string()],
            _ => vec![
                "terminal length 0".to_string(),
                "terminal width 512".to_string(),
            ],
        }
    }

    /// Commands that enter configuration mode
    pub fn enter_config_mode(&self) -> Vec<String> {
        match self {
            Platform::Junos => vec!["configure".to_string()],
            _ => vec!["configure terminal".to_string()],
        }
    }

    /// Commands that leave configuration mode, committing where required
    pub fn exit_config_mode(&self) -> Vec<String> {
        match self {
            Platform::Junos => vec!["commit and-quit".to_string()],
            _ => vec!["end".to_string()],
        }
    }

    /// Commands that abandon a configuration session after a failure
    pub fn abort_config_mode(&self) -> Vec<String> {
        match self {
            Platform::Junos => vec!["rollback 0".to_string(), "exit".to_string()],
            _ => vec!["end".to_string()],
        }
    }

    /// Commands that persist the running configuration across reloads
    pub fn save_config(&self) -> Vec<String> {
        match self {
            Platform::Ios => vec!["write memory".to_string()],
            Platform::Eos | Platform::Nxos => {
                vec!["copy running-config startup-config".to_string()]
            }
            // A Junos commit is already persistent
            Platform::Junos => Vec::new(),
        }
    }

    /// Wrap configuration commands in enter/exit configuration mode
    pub fn wrap_config(&self, commands: &[String]) -> Vec<String> {
        let mut wrapped = self.enter_config_mode();
        wrapped.extend(commands.iter().map(|c| c.trim().to_string()));
        wrapped.extend(self.exit_config_mode());
        wrapped
    }

    /// Keyword used to negate a statement in configuration mode
    pub fn negation_prefix(&self) -> &'static str {
        match self {
            Platform::Junos => "delete",
            _ => "no",
        }
    }

    /// Settings whose trailing tokens are treated as the statement body
    pub fn keyed_settings(&self) -> Vec<&'static [&'static str]> {
        let mut keyed: Vec<&'static [&'static str]> = match self {
            Platform::Junos => JUNOS_KEYED.to_vec(),
            Platform::Nxos => LINE_ORIENTED_KEYED
                .iter()
                .chain(NXOS_EXTRA_KEYED.iter())
                .copied()
                .collect(),
            _ => LINE_ORIENTED_KEYED.to_vec(),
        };
        // Longest keys first so `ip address` wins over a shorter prefix
        keyed.sort_by(|a, b| b.len().cmp(&a.len()));
        keyed
    }

    /// Inspect command output for the device's error markers.
    ///
    /// Devices usually report a rejected command as ordinary output rather
    /// than a transport failure, so every configuration command is checked.
    pub fn check_output(&self, command: &str, output: &str) -> Result<(), CommandError> {
        let rejected = output.lines().map(str::trim).find(|line| match self {
            Platform::Junos => {
                line.starts_with("error:")
                    || line.starts_with("syntax error")
                    || line.starts_with("unknown command")
                    || line.starts_with("missing argument")
            }
            _ => {
                line.starts_with('%')
                    && ["Invalid", "Incomplete", "Ambiguous", "Unknown", "Error", "not allowed"]
                        .iter()
                        .any(|marker| line.contains(marker))
            }
        });

        match rejected {
            Some(line) => Err(CommandError::Rejected {
                command: command.to_string(),
                message: line.to_string(),
            }),
            None => Ok(()),
        }
    }
}
