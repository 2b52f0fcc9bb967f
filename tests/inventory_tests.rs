//! Inventory loading and plan construction from files.

use netdrift::deploy::{DeploymentBatch, DeploymentPlan};
use netdrift::drift::Assertion;
use netdrift::inventory::{Inventory, InventoryError};
use netdrift::network::Platform;
use netdrift::snapshot::StatementPath;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

const INVENTORY: &str = r#"
devices:
  - name: core-1
    host: 10.0.0.1
    device_type: cisco_ios
  - name: leaf-1
    host: 10.0.1.1
    device_type: arista_eos
  - name: edge-7
    host: edge-7.example.net
    device_type: juniper_junos
"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_temp(INVENTORY);
    let inventory = Inventory::load(file.path()).unwrap();

    assert_eq!(inventory.len(), 3);
    assert_eq!(inventory.source(), Some(file.path()));
    let names: Vec<_> = inventory.devices().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["core-1", "leaf-1", "edge-7"]);
    assert_eq!(inventory.get("edge-7").unwrap().platform, Platform::Junos);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let err = Inventory::load("/nonexistent/netdrift/inventory.yml").unwrap_err();
    assert!(matches!(err, InventoryError::Read { .. }));
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let file = write_temp("devices: [unterminated");
    assert!(matches!(
        Inventory::load(file.path()),
        Err(InventoryError::Yaml(_))
    ));
}

#[test]
fn test_uniform_batch_parses_per_platform() {
    let inventory = Inventory::from_yaml(INVENTORY).unwrap();
    let targets = inventory.select("core-*,leaf-*").unwrap();
    let batch = DeploymentBatch::uniform(&targets, "vlan 30\n name LAB\n").unwrap();

    assert_eq!(batch.devices().collect::<Vec<_>>(), vec!["core-1", "leaf-1"]);
    for plan in batch.plans() {
        assert!(plan
            .assertions
            .contains(&Assertion::present("vlan/30/name", "LAB")));
    }
}

#[test]
fn test_plan_from_file() {
    let file = write_temp("# new guest vlan\nset vlans GUEST vlan-id 20\ndelete vlans OLD\n");
    let plan = DeploymentPlan::from_file("edge-7", Platform::Junos, file.path()).unwrap();

    assert_eq!(plan.device, "edge-7");
    assert_eq!(
        plan.commands,
        vec!["set vlans GUEST vlan-id 20", "delete vlans OLD"]
    );
    assert!(plan
        .assertions
        .contains(&Assertion::absent(StatementPath::new(["vlans", "OLD"]))));
}
