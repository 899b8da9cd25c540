//! Test doubles for the collaborator traits.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use anyhow::{anyhow, Result};
use crate::collab::{NetworkProvider, Notifier, NotifyKind, ProgressReporter};
use crate::registry::{RegistryStore, StoredRegistry};

pub const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

/// Simulated LAN with one sleepy host behind every name.
pub struct MockNetwork {
    connected: AtomicBool,
    resolvable: AtomicBool,
    signal_ok: AtomicBool,
    awake: AtomicBool,
    wake_delay: Mutex<Option<Duration>>,
    online_at: Mutex<Option<Instant>>,
    addresses: Mutex<HashMap<String, IpAddr>>,
    neighbors: Mutex<Vec<(String, IpAddr, String)>>,
    probes: AtomicUsize,
    signals: AtomicUsize,
}

impl MockNetwork {
    /// Connected network, resolvable hosts, asleep, never waking up
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            resolvable: AtomicBool::new(true),
            signal_ok: AtomicBool::new(true),
            awake: AtomicBool::new(false),
            wake_delay: Mutex::new(None),
            online_at: Mutex::new(None),
            addresses: Mutex::new(HashMap::new()),
            neighbors: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_resolvable(&self, resolvable: bool) {
        self.resolvable.store(resolvable, Ordering::SeqCst);
    }

    pub fn set_signal_ok(&self, ok: bool) {
        self.signal_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_awake(&self, awake: bool) {
        self.awake.store(awake, Ordering::SeqCst);
    }

    /// Host starts answering `delay` after a wake signal
    pub fn wakes_after(&self, delay: Duration) {
        *self.wake_delay.lock().unwrap() = Some(delay);
    }

    pub fn add_address(&self, host: &str, addr: IpAddr) {
        self.addresses.lock().unwrap().insert(host.to_ascii_lowercase(), addr);
    }

    pub fn add_neighbor(&self, interface: &str, addr: IpAddr, hardware_id: &str) {
        self.neighbors
            .lock()
            .unwrap()
            .push((interface.to_string(), addr, hardware_id.to_string()));
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }

    fn is_online(&self) -> bool {
        self.awake.load(Ordering::SeqCst)
            || self
                .online_at
                .lock()
                .unwrap()
                .is_some_and(|at| Instant::now() >= at)
    }
}

impl NetworkProvider for MockNetwork {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn resolve_address(&self, host: &str) -> Option<IpAddr> {
        if !self.resolvable.load(Ordering::SeqCst) {
            return None;
        }
        let addresses = self.addresses.lock().unwrap();
        Some(*addresses.get(&host.to_ascii_lowercase()).unwrap_or(&DEFAULT_ADDR))
    }

    fn send_wake_signal(&self, _hardware_id: &str) -> bool {
        self.signals.fetch_add(1, Ordering::SeqCst);
        if !self.signal_ok.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(delay) = *self.wake_delay.lock().unwrap() {
            *self.online_at.lock().unwrap() = Some(Instant::now() + delay);
        }
        true
    }

    fn probe(&self, _addr: IpAddr, _port: u16, timeout: Duration, _mode: u16) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        // a real probe takes a moment even when it fails fast
        std::thread::sleep(timeout.min(Duration::from_millis(2)));
        self.is_online()
    }

    fn local_interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = vec!["eth0".to_string(), "wlan0".to_string()];
        for (iface, _, _) in self.neighbors.lock().unwrap().iter() {
            if !names.contains(iface) {
                names.push(iface.clone());
            }
        }
        names
    }

    fn lookup_neighbor(&self, interface: &str, addr: IpAddr) -> Option<String> {
        self.neighbors
            .lock()
            .unwrap()
            .iter()
            .find(|(iface, a, _)| iface == interface && *a == addr)
            .map(|(_, _, mac)| mac.clone())
    }
}

/// Progress display that records what it was shown and cancels on request.
#[derive(Default)]
pub struct TestProgress {
    cancel_after_checks: Option<usize>,
    cancel_on_label: Option<&'static str>,
    canceled: AtomicBool,
    checks: AtomicUsize,
    heading: Mutex<Option<String>>,
    labels: Mutex<Vec<String>>,
    percents: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl TestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_after_checks(checks: usize) -> Self {
        Self {
            cancel_after_checks: Some(checks),
            ..Self::default()
        }
    }

    /// User cancels as soon as a label equal to `label` is shown
    pub fn cancel_on_label(label: &'static str) -> Self {
        Self {
            cancel_on_label: Some(label),
            ..Self::default()
        }
    }

    pub fn heading(&self) -> Option<String> {
        self.heading.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.percents.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for TestProgress {
    fn open(&self, heading: &str) {
        *self.heading.lock().unwrap() = Some(heading.to_string());
    }

    fn set_label(&self, line: &str) {
        if self.cancel_on_label == Some(line) {
            self.canceled.store(true, Ordering::SeqCst);
        }
        self.labels.lock().unwrap().push(line.to_string());
    }

    fn set_percent(&self, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }

    fn is_canceled(&self) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        self.canceled.load(Ordering::SeqCst)
            || self.cancel_after_checks.is_some_and(|limit| checks >= limit)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotifyKind, String, String)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<(NotifyKind, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotifyKind, title: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((kind, title.to_string(), message.to_string()));
    }
}

/// In-memory store counting its saves
#[derive(Default)]
pub struct MemoryStore {
    content: Mutex<Option<StoredRegistry>>,
    saves: AtomicUsize,
    fail_loads: bool,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with(content: StoredRegistry) -> Self {
        Self {
            content: Mutex::new(Some(content)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn replace(&self, content: StoredRegistry) {
        *self.content.lock().unwrap() = Some(content);
    }

    pub fn saved(&self) -> Option<StoredRegistry> {
        self.content.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredRegistry>> {
        if self.fail_loads {
            return Err(anyhow!("store is unreadable"));
        }
        Ok(self.content.lock().unwrap().clone())
    }

    fn save(&self, registry: &StoredRegistry) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("store is read-only"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.content.lock().unwrap() = Some(registry.clone());
        Ok(())
    }
}
