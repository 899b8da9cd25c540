use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol::{self, clamp_to};

/// A host that may be woken before it is accessed.
/// This is the canonical data model used by the registry, the store, and the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeEntry {
    /// Host name or address, e.g. "nas.local". Unique, matched case-insensitively.
    pub host: String,

    /// Link-layer address the wake signal targets, e.g. "AA:BB:CC:DD:EE:FF"
    pub hardware_id: String,

    /// Port for the liveness probe, 0 for an ICMP echo
    pub ping_port: u16,

    /// Liveness probe flags, see `protocol::PING_MODE_READABLE`
    pub ping_mode: u16,

    /// Minimum seconds between two wake attempts
    pub throttle_secs: u64,

    /// No wake is attempted before this instant. `None` means due right away.
    /// Never persisted.
    #[serde(default)]
    pub next_allowed_wake: Option<DateTime<Utc>>,

    /// First wait for the host to answer after the wake signal
    pub wait_online_secs: u64,

    /// Second wait, continuing the first one's probing
    pub wait_online_extended_secs: u64,

    /// Fixed wait after the host answered, for its services to start
    pub wait_services_secs: u64,
}

impl WakeEntry {
    /// New entry with the default timing policy, due immediately
    pub fn new(host: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            hardware_id: hardware_id.into(),
            ping_port: 0,
            ping_mode: 0,
            throttle_secs: protocol::DEFAULT_THROTTLE_SECS,
            next_allowed_wake: None,
            wait_online_secs: protocol::DEFAULT_WAIT_ONLINE_SECS,
            wait_online_extended_secs: protocol::DEFAULT_WAIT_ONLINE_EXTENDED_SECS,
            wait_services_secs: protocol::DEFAULT_WAIT_SERVICES_SECS,
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        self.host.eq_ignore_ascii_case(host)
    }

    /// A wake is due strictly after `next_allowed_wake`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_allowed_wake {
            Some(next) => now > next,
            None => true,
        }
    }

    /// Push `next_allowed_wake` to `now + throttle`. Never moves it backwards.
    pub fn rearm(&mut self, now: DateTime<Utc>) {
        let candidate = now + Duration::seconds(self.throttle_secs as i64);
        self.next_allowed_wake = Some(match self.next_allowed_wake {
            Some(current) if current > candidate => current,
            _ => candidate,
        });
    }

    /// Clamp the timing policy into the accepted ranges
    pub fn clamp_policy(&mut self) {
        self.throttle_secs = clamp_to(self.throttle_secs, &protocol::THROTTLE_RANGE);
        self.wait_online_secs = clamp_to(self.wait_online_secs, &protocol::WAIT_ONLINE_RANGE);
        self.wait_online_extended_secs =
            clamp_to(self.wait_online_extended_secs, &protocol::WAIT_ONLINE_RANGE);
        self.wait_services_secs = clamp_to(self.wait_services_secs, &protocol::WAIT_SERVICES_RANGE);
    }
}

/// Registry-wide timing, shared by every host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// How long to wait for the local network to come up
    pub network_init_timeout_secs: u64,

    /// How long the network must stay connected before it is trusted
    pub network_settle_ms: u64,
}

impl RegistrySettings {
    pub fn clamped(self) -> Self {
        Self {
            network_init_timeout_secs: clamp_to(
                self.network_init_timeout_secs,
                &protocol::NETWORK_INIT_RANGE,
            ),
            network_settle_ms: clamp_to(self.network_settle_ms, &protocol::NETWORK_SETTLE_RANGE),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            network_init_timeout_secs: protocol::DEFAULT_NETWORK_INIT_SECS,
            network_settle_ms: protocol::DEFAULT_NETWORK_SETTLE_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_due() {
        let entry = WakeEntry::new("nas.local", "AA:BB:CC:DD:EE:FF");
        assert!(entry.is_due(Utc::now()));
        assert_eq!(entry.throttle_secs, 300);
    }

    #[test]
    fn test_rearm_never_moves_backwards() {
        let mut entry = WakeEntry::new("nas.local", "AA:BB:CC:DD:EE:FF");
        let now = Utc::now();

        entry.rearm(now + Duration::seconds(100));
        let later = entry.next_allowed_wake;

        entry.rearm(now);
        assert_eq!(entry.next_allowed_wake, later);
    }

    #[test]
    fn test_clamp_policy() {
        let mut entry = WakeEntry::new("nas.local", "AA:BB:CC:DD:EE:FF");
        entry.throttle_secs = 1;
        entry.wait_online_secs = 100_000;
        entry.wait_services_secs = 301;
        entry.clamp_policy();

        assert_eq!(entry.throttle_secs, 10);
        assert_eq!(entry.wait_online_secs, 600);
        assert_eq!(entry.wait_services_secs, 300);
    }

    #[test]
    fn test_host_match_ignores_case() {
        let entry = WakeEntry::new("NAS.local", "AA:BB:CC:DD:EE:FF");
        assert!(entry.matches("nas.LOCAL"));
        assert!(!entry.matches("nas2.local"));
    }
}
