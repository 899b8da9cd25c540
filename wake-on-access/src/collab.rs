//! Contracts for everything the wake logic consumes but does not implement:
//! raw network primitives, progress display, user notifications, the
//! persistence store, candidate host enumeration and the wall clock.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use chrono::{DateTime, Utc};

/// Network primitives provided by the host platform
pub trait NetworkProvider: Send + Sync {
    /// Whether the first usable local interface reports a link
    fn is_connected(&self) -> bool;

    fn resolve_address(&self, host: &str) -> Option<IpAddr>;

    /// Transmit a wake packet for `hardware_id`. Returns false if sending failed.
    fn send_wake_signal(&self, hardware_id: &str) -> bool;

    /// Liveness probe. `port == 0` means an echo request; otherwise a TCP connect.
    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration, mode: u16) -> bool;

    /// Names of the local interfaces that can answer neighbor lookups
    fn local_interfaces(&self) -> Vec<String>;

    /// Hardware address the neighbor table of `interface` holds for `addr`
    fn lookup_neighbor(&self, interface: &str, addr: IpAddr) -> Option<String>;
}

/// Optional progress display for a blocking wake. Absent in non-interactive use.
pub trait ProgressReporter: Send + Sync {
    fn open(&self, heading: &str);
    fn set_label(&self, line: &str);
    fn set_percent(&self, percent: u8);
    fn is_canceled(&self) -> bool;
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Info,
    Error,
}

/// User-facing notifications (toasts in an interactive host)
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotifyKind, title: &str, message: &str);
}

/// Hosts worth discovering, gathered from the host application's configuration
pub trait CandidateSource {
    fn candidate_hosts(&self) -> Vec<String>;
}

/// Fixed list of candidates
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates(pub Vec<String>);

impl CandidateSource for StaticCandidates {
    fn candidate_hosts(&self) -> Vec<String> {
        self.0.clone()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
