//! Device facts extracted from `show version` output.

use super::Platform;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

type FactPatterns = Vec<(&'static str, Regex)>;

fn patterns(table: &[(&'static str, &str)]) -> FactPatterns {
    table
        .iter()
        .map(|(fact, pattern)| (*fact, Regex::new(pattern).expect("Invalid fact regex")))
        .collect()
}

static IOS_FACTS: Lazy<FactPatterns> = Lazy::new(|| {
    patterns(&[
        ("os_version", r"(?m)Cisco IOS.*?Version ([^\s,]+)"),
        ("model", r"(?m)^[Cc]isco (\S+) \(.+\) processor"),
        ("serial", r"(?m)^Processor board ID (\S+)"),
        ("hostname", r"(?m)^(\S+) uptime is .+$"),
        ("uptime", r"(?m)^\S+ uptime is (.+?)\s*$"),
    ])
});

static EOS_FACTS: Lazy<FactPatterns> = Lazy::new(|| {
    patterns(&[
        ("os_version", r"(?m)^Software image version:\s*(\S+)"),
        ("model", r"(?m)^Arista (\S+)"),
        ("serial", r"(?m)^Serial number:\s*(\S+)"),
        ("uptime", r"(?m)^Uptime:\s*(.+?)\s*$"),
    ])
});

static NXOS_FACTS: Lazy<FactPatterns> = Lazy::new(|| {
    patterns(&[
        ("os_version", r"(?m)^\s*(?:NXOS|system):\s+version\s+(\S+)"),
        ("model", r"(?m)^\s*cisco (Nexus\s?\S+)"),
        ("serial", r"(?m)^\s*Processor Board ID\s+(\S+)"),
        ("hostname", r"(?m)^\s*Device name:\s*(\S+)"),
        ("uptime", r"(?m)^Kernel uptime is (.+?)\s*$"),
    ])
});

static JUNOS_FACTS: Lazy<FactPatterns> = Lazy::new(|| {
    patterns(&[
        ("hostname", r"(?m)^Hostname:\s*(\S+)"),
        ("model", r"(?m)^Model:\s*(\S+)"),
        ("os_version", r"(?m)^Junos:\s*(\S+)"),
    ])
});

/// Extract the facts a platform reports in `show version`.
///
/// Facts that do not appear in the output are simply absent.
pub fn extract_facts(platform: Platform, output: &str) -> BTreeMap<String, String> {
    let table: &FactPatterns = match platform {
        Platform::Ios => &IOS_FACTS,
        Platform::Eos => &EOS_FACTS,
        Platform::Nxos => &NXOS_FACTS,
        Platform::Junos => &JUNOS_FACTS,
    };

    table
        .iter()
        .filter_map(|(fact, regex)| {
            regex
                .captures(output)
                .and_then(|c| c.get(1))
                .map(|m| (fact.to_string(), m.as_str().trim().to_string()))
        })
        .collect()
}
