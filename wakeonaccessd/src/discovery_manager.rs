use std::time::Duration;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::Result;
use wake_on_access::collab::StaticCandidates;
use wake_on_access::WakeOnAccess;
use crate::config::DiscoveryConfig;
use crate::mdns::browser::browse_candidate_hosts;

/// Periodically queue hardware id discovery for the configured hosts plus
/// whatever mDNS turns up.
pub async fn run(
    woa: WakeOnAccess,
    daemon: ServiceDaemon,
    config: DiscoveryConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                discovery_round(&woa, &daemon, &config, &cancel).await;
            }
            _ = cancel.cancelled() => {
                tracing::info!("Discovery manager shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn discovery_round(
    woa: &WakeOnAccess,
    daemon: &ServiceDaemon,
    config: &DiscoveryConfig,
    cancel: &CancellationToken,
) {
    if !woa.is_enabled() {
        tracing::debug!("Wake on access disabled, skipping discovery");
        return;
    }

    let browsed = browse_candidate_hosts(
        daemon,
        &config.mdns_service_types,
        Duration::from_secs(config.browse_secs),
        cancel,
    )
    .await;

    let candidates = StaticCandidates(config.hosts.iter().cloned().chain(browsed).collect());
    let jobs = woa.queue_discovery_for_all(&candidates);
    tracing::info!("Queued hardware address discovery for {} hosts", jobs.len());
}
