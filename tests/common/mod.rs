//! Common test utilities for netdrift integration tests.
//!
//! Provides a scripted device fleet behind the `SessionFactory` seam and a
//! backup store whose writes can be made to fail.
//!
//! A mock device holds a list of running configurations. `show
//! running-config` (or `show configuration`) prints the current one, and
//! every command that leaves configuration mode (`end`, `commit and-quit`)
//! moves the device on to the next configuration in the list. The last
//! configuration stays current once the list is exhausted.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use netdrift::connection::{
    CommandError, CommandResult, ConnectionError, ConnectionResult, DeviceSession,
    SessionFactory,
};
use netdrift::inventory::DeviceTarget;
use netdrift::network::Platform;
use netdrift::snapshot::{ConfigSnapshot, SnapshotHandle};
use netdrift::store::{BackupStore, MemoryBackupStore, StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Output printed by IOS-like devices for a rejected command
pub const INVALID_INPUT: &str = "                ^\n% Invalid input detected at '^' marker.";

/// IOS running configuration used across tests
pub const IOS_BASE: &str = "\
Building configuration...

Current configuration : 214 bytes
!
hostname sw1
!
vlan 10
 name SALES
!
interface GigabitEthernet0/1
 description Uplink
 switchport mode trunk
!
end
";

/// `IOS_BASE` with vlan 20 added
pub const IOS_WITH_GUEST: &str = "\
Building configuration...

Current configuration : 236 bytes
!
hostname sw1
!
vlan 10
 name SALES
!
vlan 20
 name GUEST
!
interface GigabitEthernet0/1
 description Uplink
 switchport mode trunk
!
end
";

/// Commands that add vlan 20
pub const ADD_GUEST_VLAN: &str = "vlan 20\n name GUEST\n";

/// Generic IOS `show version` output
pub const IOS_VERSION: &str = "\
Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.2(7)E3, RELEASE SOFTWARE (fc3)
sw1 uptime is 2 weeks, 3 days, 1 hour, 12 minutes
Processor board ID FOC1234X0AB
";

/// Scripted state of one mock device
#[derive(Debug)]
pub struct MockDevice {
    platform: Platform,
    configs: RwLock<Vec<String>>,
    position: AtomicUsize,
    version: RwLock<Option<String>>,
    fail_patterns: RwLock<Vec<String>>,
    reject_patterns: RwLock<Vec<String>>,
    panic_patterns: RwLock<Vec<String>>,
    startup: RwLock<Option<String>>,
    interfaces: RwLock<Option<String>>,
    log: RwLock<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MockDevice {
    fn new(platform: Platform, configs: Vec<String>) -> Self {
        Self {
            platform,
            configs: RwLock::new(configs),
            position: AtomicUsize::new(0),
            version: RwLock::new(Some(IOS_VERSION.to_string())),
            fail_patterns: RwLock::new(Vec::new()),
            reject_patterns: RwLock::new(Vec::new()),
            panic_patterns: RwLock::new(Vec::new()),
            startup: RwLock::new(None),
            interfaces: RwLock::new(None),
            log: RwLock::new(Vec::new()),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Make every command containing `pattern` fail at the transport
    pub fn fail_command(&self, pattern: &str) -> &Self {
        self.fail_patterns.write().push(pattern.to_string());
        self
    }

    /// Make the device print an error marker for commands containing `pattern`
    pub fn reject_command(&self, pattern: &str) -> &Self {
        self.reject_patterns.write().push(pattern.to_string());
        self
    }

    /// Panic inside `exec` for commands containing `pattern`, the way a
    /// crashing adapter would
    pub fn panic_on_command(&self, pattern: &str) -> &Self {
        self.panic_patterns.write().push(pattern.to_string());
        self
    }

    /// Text printed by the startup configuration command
    pub fn with_startup(&self, config: &str) -> &Self {
        *self.startup.write() = Some(config.to_string());
        self
    }

    /// Text printed by the interface summary command
    pub fn with_interfaces(&self, output: &str) -> &Self {
        *self.interfaces.write() = Some(output.to_string());
        self
    }

    /// Make `show version` fail
    pub fn without_version(&self) -> &Self {
        *self.version.write() = None;
        self
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.log.read().clone()
    }

    /// Whether any received command equals `command`
    pub fn received(&self, command: &str) -> bool {
        self.log.read().iter().any(|c| c == command)
    }

    /// Number of exit-config commands processed
    pub fn transitions(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    /// Sessions opened to this device
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed on this device
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn current_config(&self) -> String {
        let configs = self.configs.read();
        let index = self.position.load(Ordering::SeqCst).min(configs.len().saturating_sub(1));
        configs.get(index).cloned().unwrap_or_default()
    }

    fn respond(&self, command: &str) -> CommandResult<String> {
        self.log.write().push(command.to_string());

        if self.panic_patterns.read().iter().any(|p| command.contains(p.as_str())) {
            panic!("simulated adapter crash on '{}'", command);
        }
        if self.fail_patterns.read().iter().any(|p| command.contains(p.as_str())) {
            return Err(CommandError::Transport(ConnectionError::ConnectionClosed));
        }
        if self.reject_patterns.read().iter().any(|p| command.contains(p.as_str())) {
            return Ok(INVALID_INPUT.to_string());
        }

        match command {
            "show running-config" | "show configuration" => Ok(self.current_config()),
            "show version" => self.version.read().clone().ok_or_else(|| CommandError::Failed {
                command: command.to_string(),
                exit_code: 1,
                stderr: "command not available".to_string(),
            }),
            "show startup-config" | "show system configuration rescue" => {
                Ok(self.startup.read().clone().unwrap_or_default())
            }
            "show ip interface brief" | "show interfaces terse" => {
                Ok(self.interfaces.read().clone().unwrap_or_default())
            }
            "end" | "commit and-quit" => {
                self.position.fetch_add(1, Ordering::SeqCst);
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }
}

/// Concurrency bookkeeping shared by all sessions of a factory
#[derive(Debug, Default)]
struct Activity {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Activity {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session factory serving scripted devices
#[derive(Debug, Default)]
pub struct MockSessionFactory {
    devices: DashMap<String, Arc<MockDevice>>,
    refuse: RwLock<HashSet<String>>,
    activity: Arc<Activity>,
    command_delay: RwLock<Option<Duration>>,
    panic_on_open: RwLock<HashSet<String>>,
}

impl MockSessionFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device that always shows `config`
    pub fn add_device(&self, name: &str, platform: Platform, config: &str) -> Arc<MockDevice> {
        self.add_scripted(name, platform, &[config])
    }

    /// Register a device that moves through `configs` on each exit from
    /// configuration mode
    pub fn add_scripted(&self, name: &str, platform: Platform, configs: &[&str]) -> Arc<MockDevice> {
        let device = Arc::new(MockDevice::new(
            platform,
            configs.iter().map(|c| c.to_string()).collect(),
        ));
        self.devices.insert(name.to_string(), Arc::clone(&device));
        device
    }

    /// Refuse connections to a device
    pub fn refuse(&self, name: &str) {
        self.refuse.write().insert(name.to_string());
    }

    /// Panic inside `open` for a device
    pub fn panic_on_open(&self, name: &str) {
        self.panic_on_open.write().insert(name.to_string());
    }

    /// Delay every command by `delay`
    pub fn with_command_delay(self, delay: Duration) -> Self {
        *self.command_delay.write() = Some(delay);
        self
    }

    /// Look up a registered device
    pub fn device(&self, name: &str) -> Arc<MockDevice> {
        self.devices
            .get(name)
            .map(|d| Arc::clone(d.value()))
            .unwrap_or_else(|| panic!("no mock device named {}", name))
    }

    /// Highest number of sessions open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.activity.peak.load(Ordering::SeqCst)
    }

    /// Sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.activity.active.load(Ordering::SeqCst)
    }

    /// Targets for every registered device, sorted by name
    pub fn targets(&self) -> Vec<DeviceTarget> {
        let mut targets: Vec<_> = self
            .devices
            .iter()
            .map(|entry| DeviceTarget::new(entry.key().clone(), entry.value().platform))
            .collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        targets
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>> {
        if self.panic_on_open.read().contains(&target.name) {
            panic!("simulated adapter crash for {}", target.name);
        }
        if self.refuse.read().contains(&target.name) {
            return Err(ConnectionError::failed(&target.name, "connection refused"));
        }
        let device = self
            .devices
            .get(&target.name)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| ConnectionError::failed(&target.name, "no route to host"))?;

        device.opened.fetch_add(1, Ordering::SeqCst);
        self.activity.enter();
        Ok(Box::new(MockSession {
            name: target.name.clone(),
            device,
            activity: Arc::clone(&self.activity),
            delay: *self.command_delay.read(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One open session to a mock device
pub struct MockSession {
    name: String,
    device: Arc<MockDevice>,
    activity: Arc<Activity>,
    delay: Option<Duration>,
    closed: AtomicBool,
}

#[async_trait]
impl DeviceSession for MockSession {
    fn device(&self) -> &str {
        &self.name
    }

    async fn exec(&self, command: &str) -> CommandResult<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CommandError::Transport(ConnectionError::ConnectionClosed));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.device.respond(command)
    }

    async fn close(&self) -> ConnectionResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.device.closed.fetch_add(1, Ordering::SeqCst);
            self.activity.leave();
        }
        Ok(())
    }
}

/// Backup store that fails saves for selected devices
#[derive(Debug, Default)]
pub struct FailingBackupStore {
    inner: MemoryBackupStore,
    failing: RwLock<HashSet<String>>,
    fail_after: DashMap<String, usize>,
}

impl FailingBackupStore {
    /// Create a store where every save succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every save for `device`
    pub fn fail_device(&self, device: &str) {
        self.failing.write().insert(device.to_string());
    }

    /// Let `count` saves for `device` succeed, then fail the rest
    pub fn fail_after(&self, device: &str, count: usize) {
        self.fail_after.insert(device.to_string(), count);
    }

    /// Number of snapshots stored for a device
    pub fn count(&self, device: &str) -> usize {
        self.inner.count(device)
    }
}

#[async_trait]
impl BackupStore for FailingBackupStore {
    async fn save(&self, snapshot: &ConfigSnapshot) -> StoreResult<SnapshotHandle> {
        if self.failing.read().contains(&snapshot.device) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        if let Some(limit) = self.fail_after.get(&snapshot.device).map(|l| *l) {
            if self.inner.count(&snapshot.device) >= limit {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
        }
        self.inner.save(snapshot).await
    }

    async fn load(&self, device: &str, at_or_before: DateTime<Utc>) -> StoreResult<ConfigSnapshot> {
        self.inner.load(device, at_or_before).await
    }

    async fn list(&self, device: &str) -> StoreResult<Vec<SnapshotHandle>> {
        self.inner.list(device).await
    }
}

/// Build `count` IOS device names `sw01`, `sw02`, ...
pub fn device_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("sw{:02}", i)).collect()
}
