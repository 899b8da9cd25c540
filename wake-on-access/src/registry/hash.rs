use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::WakeEntry;

/// Only persisted fields take part; `next_allowed_wake` moves on every access
/// and would make the hash useless for change detection.
#[derive(Serialize)]
struct HashView<'a> {
    host: String,
    hardware_id: &'a str,
    ping_port: u16,
    ping_mode: u16,
    throttle_secs: u64,
    wait_online_secs: u64,
    wait_online_extended_secs: u64,
    wait_services_secs: u64,
}

/// Computes a SHA-256 hash of the registry entries.
/// Entries are ordered by lower-cased host for deterministic output.
pub fn compute_hash(entries: &[WakeEntry]) -> String {
    let mut views: Vec<HashView<'_>> = entries
        .iter()
        .map(|e| HashView {
            host: e.host.to_ascii_lowercase(),
            hardware_id: &e.hardware_id,
            ping_port: e.ping_port,
            ping_mode: e.ping_mode,
            throttle_secs: e.throttle_secs,
            wait_online_secs: e.wait_online_secs,
            wait_online_extended_secs: e.wait_online_extended_secs,
            wait_services_secs: e.wait_services_secs,
        })
        .collect();
    views.sort_by(|a, b| a.host.cmp(&b.host));

    // plain structs of strings and integers always serialize
    let json = serde_json::to_string(&views).unwrap_or_default();

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}
