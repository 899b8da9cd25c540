use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver; flume::Receiver is Clone.
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

/// Browse `service_types` for `window` and return the host names that
/// announced any of them, without the local host.
pub async fn browse_candidate_hosts(
    daemon: &ServiceDaemon,
    service_types: &[String],
    window: Duration,
    cancel: &CancellationToken,
) -> Vec<String> {
    let local = local_hostname();
    let mut hosts: Vec<String> = Vec::new();
    let mut browsing = Vec::new();
    let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();

    for (idx, service_type) in service_types.iter().enumerate() {
        match daemon.browse(service_type) {
            Ok(receiver) => {
                browsing.push(service_type.as_str());
                type_futures.push(make_recv_future(idx, receiver));
            }
            Err(e) => {
                tracing::error!("Failed to browse {}: {}", service_type, e);
            }
        }
    }

    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    while !type_futures.is_empty() {
        tokio::select! {
            Some((idx, rx, result)) = type_futures.next() => {
                match result {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        if let Some(host) = candidate_from_hostname(info.get_hostname(), local.as_deref()) {
                            if !hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
                                tracing::debug!("mDNS candidate host: {}", host);
                                hosts.push(host);
                            }
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Ok(_) => {
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver {} disconnected: {}", idx, e);
                    }
                }
            }

            _ = &mut deadline => break,

            _ = cancel.cancelled() => break,
        }
    }

    for service_type in browsing {
        if let Err(e) = daemon.stop_browse(service_type) {
            tracing::debug!("Failed to stop browsing {}: {}", service_type, e);
        }
    }

    hosts
}

fn local_hostname() -> Option<String> {
    match hostname::get() {
        Ok(name) => Some(name.to_string_lossy().into_owned()),
        Err(e) => {
            tracing::warn!("Can't determine local hostname: {}", e);
            None
        }
    }
}

/// Turn an mDNS host name like "nas.local." into a candidate, unless it names
/// this machine.
fn candidate_from_hostname(hostname: &str, local: Option<&str>) -> Option<String> {
    let host = hostname.trim().trim_end_matches('.');
    if host.is_empty() {
        return None;
    }

    if let Some(local) = local {
        let short = host.split('.').next().unwrap_or(host);
        if host.eq_ignore_ascii_case(local) || short.eq_ignore_ascii_case(local) {
            return None;
        }
    }

    Some(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_strips_trailing_dot() {
        assert_eq!(candidate_from_hostname("nas.local.", None).as_deref(), Some("nas.local"));
        assert_eq!(candidate_from_hostname(".", None), None);
        assert_eq!(candidate_from_hostname("", None), None);
    }

    #[test]
    fn test_candidate_excludes_local_host() {
        assert_eq!(candidate_from_hostname("Desktop.local.", Some("desktop")), None);
        assert_eq!(candidate_from_hostname("desktop.local.", Some("desktop.local")), None);
        assert_eq!(
            candidate_from_hostname("nas.local.", Some("desktop")).as_deref(),
            Some("nas.local")
        );
    }
}
