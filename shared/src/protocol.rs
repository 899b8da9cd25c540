use std::ops::RangeInclusive;

/// API path prefix
pub const API_PREFIX: &str = "/v1";

/// Wait for the local network after startup or resume
pub const DEFAULT_NETWORK_INIT_SECS: u64 = 20;
/// Continuous connectivity required before the network is trusted
pub const DEFAULT_NETWORK_SETTLE_MS: u64 = 500;

/// Minimum spacing between wake signals for one host
pub const DEFAULT_THROTTLE_SECS: u64 = 5 * 60;
pub const DEFAULT_WAIT_ONLINE_SECS: u64 = 40;
pub const DEFAULT_WAIT_ONLINE_EXTENDED_SECS: u64 = 40;
/// Time for file sharing daemons to start once the host answers
pub const DEFAULT_WAIT_SERVICES_SECS: u64 = 5;

/// Accepted ranges for persisted values. Anything outside is clamped on load.
pub const NETWORK_INIT_RANGE: RangeInclusive<u64> = 0..=5 * 60;
pub const NETWORK_SETTLE_RANGE: RangeInclusive<u64> = 0..=5 * 1000;
pub const THROTTLE_RANGE: RangeInclusive<u64> = 10..=12 * 60 * 60;
pub const WAIT_ONLINE_RANGE: RangeInclusive<u64> = 0..=10 * 60;
pub const WAIT_SERVICES_RANGE: RangeInclusive<u64> = 0..=5 * 60;

/// `ping_mode` bit: after connecting, also require the socket to turn readable
pub const PING_MODE_READABLE: u16 = 0x1;

/// Clamp `value` into `range`
pub fn clamp_to(value: u64, range: &RangeInclusive<u64>) -> u64 {
    value.clamp(*range.start(), *range.end())
}
