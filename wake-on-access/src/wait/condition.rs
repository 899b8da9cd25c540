use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use shared::protocol::PING_MODE_READABLE;
use shared::types::WakeEntry;
use crate::collab::NetworkProvider;
use crate::jobs::{JobHandle, JobRunner};

/// Timeout of a single liveness probe while waiting for a host
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

/// One liveness probe against `entry`. An unresolvable host counts as offline.
pub fn probe_host(
    network: &dyn NetworkProvider,
    entry: &WakeEntry,
    timeout: Duration,
    mode: u16,
) -> bool {
    match network.resolve_address(&entry.host) {
        Some(addr) => network.probe(addr, entry.ping_port, timeout, mode),
        None => {
            tracing::debug!("Can't resolve '{}' for liveness probe", entry.host);
            false
        }
    }
}

/// Something a wait can succeed on. The set of behaviors is closed.
pub enum WaitCondition<'a> {
    NetworkReady(NetworkReady<'a>),
    SyncProbe(SyncProbe<'a>),
    AsyncProbe(AsyncProbe),
    /// Never satisfied; the wait always runs to its timeout
    Fixed,
}

impl<'a> WaitCondition<'a> {
    pub fn network_ready(network: &'a dyn NetworkProvider, settle: Duration) -> Self {
        WaitCondition::NetworkReady(NetworkReady::new(network, settle))
    }

    /// Liveness wait for `entry`. With a job runner the probing happens in a
    /// background job, otherwise each check probes on the calling thread.
    pub fn liveness(
        network: &'a Arc<dyn NetworkProvider>,
        entry: &'a WakeEntry,
        jobs: Option<&JobRunner>,
    ) -> Self {
        match jobs {
            Some(jobs) => WaitCondition::AsyncProbe(AsyncProbe::start(
                jobs,
                Arc::clone(network),
                entry.clone(),
            )),
            None => WaitCondition::SyncProbe(SyncProbe {
                network: network.as_ref(),
                entry,
            }),
        }
    }

    pub fn is_satisfied(&mut self) -> bool {
        match self {
            WaitCondition::NetworkReady(cond) => cond.is_satisfied(),
            WaitCondition::SyncProbe(cond) => cond.is_satisfied(),
            WaitCondition::AsyncProbe(cond) => cond.is_satisfied(),
            WaitCondition::Fixed => false,
        }
    }
}

/// Local network connected, and stayed connected for the settle time
pub struct NetworkReady<'a> {
    network: &'a dyn NetworkProvider,
    settle: Duration,
    connected_since: Option<Instant>,
}

impl<'a> NetworkReady<'a> {
    pub fn new(network: &'a dyn NetworkProvider, settle: Duration) -> Self {
        Self {
            network,
            settle,
            connected_since: None,
        }
    }

    pub fn is_satisfied(&mut self) -> bool {
        if !self.network.is_connected() {
            // start over; the link has to be stable for the whole settle time
            self.connected_since = None;
            return false;
        }

        let since = *self.connected_since.get_or_insert_with(Instant::now);
        since.elapsed() >= self.settle
    }
}

pub struct SyncProbe<'a> {
    network: &'a dyn NetworkProvider,
    entry: &'a WakeEntry,
}

impl SyncProbe<'_> {
    pub fn is_satisfied(&self) -> bool {
        probe_host(self.network, self.entry, PROBE_TIMEOUT, self.entry.ping_mode)
    }
}

/// Liveness probing in a background job, so the waiting thread only reads a flag.
///
/// The job keeps probing until the host answers or the condition is dropped.
pub struct AsyncProbe {
    online: Arc<AtomicBool>,
    job: JobHandle,
}

impl AsyncProbe {
    pub fn start(jobs: &JobRunner, network: Arc<dyn NetworkProvider>, entry: WakeEntry) -> Self {
        let online = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&online);
        let job = jobs.submit(
            "host-prober",
            move |cancel| {
                while !cancel.is_cancelled() {
                    if probe_host(network.as_ref(), &entry, PROBE_TIMEOUT, entry.ping_mode) {
                        return true;
                    }
                }
                false
            },
            move |success| flag.store(success, Ordering::Release),
        );

        Self { online, job }
    }

    pub fn is_satisfied(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl Drop for AsyncProbe {
    fn drop(&mut self) {
        self.job.cancel();
        // a probe in flight finishes within its own timeout
        if !self.job.join_timeout(PROBE_TIMEOUT + Duration::from_millis(500)) {
            tracing::warn!("Host prober job {} did not stop in time", self.job.id());
        }
    }
}

/// Readability only matters for the long waits; quick checks just connect.
pub(crate) fn without_readability(mode: u16) -> u16 {
    mode & !PING_MODE_READABLE
}
