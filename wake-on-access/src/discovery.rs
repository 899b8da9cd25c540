use crate::collab::{CandidateSource, NetworkProvider};
use crate::error::WakeError;

/// Find the hardware address of `host` in the neighbor table of any local
/// interface. The first interface that knows the address wins.
pub fn discover(network: &dyn NetworkProvider, host: &str) -> Result<String, WakeError> {
    let Some(addr) = network.resolve_address(host) else {
        tracing::error!("Can't determine address of '{}'", host);
        return Err(WakeError::AddressResolutionFailure {
            host: host.to_string(),
        });
    };

    for interface in network.local_interfaces() {
        if let Some(hardware_id) = network.lookup_neighbor(&interface, addr) {
            tracing::debug!("Found {} for '{}' ({}) on {}", hardware_id, host, addr, interface);
            return Ok(hardware_id);
        }
    }

    Err(WakeError::DiscoveryFailure {
        host: host.to_string(),
    })
}

/// Candidate hosts without empties or case-insensitive duplicates, in first-seen order
pub fn collect_candidates<I, S>(hosts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<String> = Vec::new();
    for host in hosts {
        let host = host.as_ref().trim();
        if host.is_empty() || unique.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            continue;
        }
        unique.push(host.to_string());
    }
    unique
}

/// Candidates from several sources, merged with `collect_candidates`
pub fn gather_candidates(sources: &[&dyn CandidateSource]) -> Vec<String> {
    collect_candidates(sources.iter().flat_map(|s| s.candidate_hosts()))
}
