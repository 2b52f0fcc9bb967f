//! Interface state extracted from the per-platform interface summary.

use super::Platform;
use crate::snapshot::InterfaceState;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("Invalid interface regex")
}

// GigabitEthernet0/2  unassigned  YES unset  administratively down  down
static IOS_BRIEF: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?m)^(\S+)\s+\S+\s+(?:YES|NO)\s+\S+\s+(administratively down|up|down|deleted)\s+(up|down)\s*$")
});

// Ethernet1  10.0.0.1/31  up  up  1500
static EOS_BRIEF: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?m)^(\S+)\s+\S+\s+(adminDown|up|down|lowerLayerDown|notPresent)\s+(up|down|lowerLayerDown|notPresent)\b")
});

// Vlan10  10.0.0.1  protocol-up/link-up/admin-up
static NXOS_BRIEF: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?m)^(\S+)\s+\S+\s+protocol-(up|down)/link-(?:up|down)/admin-(up|down)")
});

// ge-0/0/0.0  up  down  inet  10.0.0.1/31
static JUNOS_TERSE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?m)^(\S+)\s+(up|down)\s+(up|down)\b"));

/// Parse `show ip interface brief` / `show interfaces terse` output.
///
/// Lines that do not describe an interface (headers, prompts) are skipped.
pub fn parse_interfaces(platform: Platform, output: &str) -> BTreeMap<String, InterfaceState> {
    let mut interfaces = BTreeMap::new();
    match platform {
        Platform::Ios | Platform::Eos => {
            let regex: &Regex = if platform == Platform::Ios { &*IOS_BRIEF } else { &*EOS_BRIEF };
            for caps in regex.captures_iter(output) {
                let state = InterfaceState {
                    enabled: !matches!(&caps[2], "administratively down" | "adminDown"),
                    up: &caps[3] == "up",
                };
                interfaces.insert(caps[1].to_string(), state);
            }
        }
        Platform::Nxos => {
            for caps in NXOS_BRIEF.captures_iter(output) {
                let state = InterfaceState {
                    enabled: &caps[3] == "up",
                    up: &caps[2] == "up",
                };
                interfaces.insert(caps[1].to_string(), state);
            }
        }
        Platform::Junos => {
            for caps in JUNOS_TERSE.captures_iter(output) {
                let state = InterfaceState {
                    enabled: &caps[2] == "up",
                    up: &caps[3] == "up",
                };
                interfaces.insert(caps[1].to_string(), state);
            }
        }
    }
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(enabled: bool, up: bool) -> InterfaceState {
        InterfaceState { enabled, up }
    }

    #[test]
    fn test_ios_brief() {
        let output = "\
Interface              IP-Address      OK? Method Status                Protocol
GigabitEthernet0/1     unassigned      YES unset  up                    up
GigabitEthernet0/2     unassigned      YES unset  administratively down down
Vlan10                 10.0.0.1        YES NVRAM  up                    down
sw1#";
        let interfaces = parse_interfaces(Platform::Ios, output);
        assert_eq!(interfaces.len(), 3);
        assert_eq!(interfaces["GigabitEthernet0/1"], state(true, true));
        assert_eq!(interfaces["GigabitEthernet0/2"], state(false, false));
        assert_eq!(interfaces["Vlan10"], state(true, false));
    }

    #[test]
    fn test_eos_brief() {
        let output = "\
Interface         IP Address       Status     Protocol         MTU    Owner
Ethernet1         10.0.0.1/31      up         up               1500
Management1       unassigned       adminDown  down             1500
";
        let interfaces = parse_interfaces(Platform::Eos, output);
        assert_eq!(interfaces["Ethernet1"], state(true, true));
        assert_eq!(interfaces["Management1"], state(false, false));
    }

    #[test]
    fn test_nxos_brief() {
        let output = "\
IP Interface Status for VRF \"default\"(1)
Interface            IP Address      Interface Status
Vlan10               10.0.0.1        protocol-up/link-up/admin-up
Eth1/1               10.1.0.1        protocol-down/link-down/admin-down
";
        let interfaces = parse_interfaces(Platform::Nxos, output);
        assert_eq!(interfaces["Vlan10"], state(true, true));
        assert_eq!(interfaces["Eth1/1"], state(false, false));
    }

    #[test]
    fn test_junos_terse() {
        let output = "\
Interface               Admin Link Proto    Local                 Remote
ge-0/0/0                up    up
ge-0/0/0.0              up    up   inet     10.0.0.1/31
ge-0/0/1                down  down
";
        let interfaces = parse_interfaces(Platform::Junos, output);
        assert_eq!(interfaces.len(), 3);
        assert_eq!(interfaces["ge-0/0/0.0"], state(true, true));
        assert_eq!(interfaces["ge-0/0/1"], state(false, false));
    }
}
