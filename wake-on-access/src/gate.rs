use std::sync::Arc;
use url::{Host, Url};
use crate::collab::{CandidateSource, Clock, NetworkProvider, Notifier, NotifyKind, ProgressReporter};
use crate::discovery::{discover, gather_candidates};
use crate::error::WakeError;
use crate::jobs::{JobHandle, JobRunner};
use crate::nesting::NestGuard;
use crate::registry::{Decision, Registry, UpsertOutcome};
use crate::sequencer::{WakeOutcome, WakeSequencer};
use shared::types::WakeEntry;

pub const DISCOVERY_TITLE: &str = "Wake on access";

/// Who is accessing, and where to show progress if anywhere
#[derive(Clone, Copy, Default)]
pub struct AccessContext<'a> {
    /// Free-form description of the access, e.g. the resource URL
    pub trigger: &'a str,
    pub progress: Option<&'a dyn ProgressReporter>,
}

impl<'a> AccessContext<'a> {
    pub fn new(trigger: &'a str) -> Self {
        Self { trigger, progress: None }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// What an access did. Purely informational: the caller proceeds either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Disabled,
    UnknownHost,
    /// Recently accessed; throttle window pushed forward, nothing sent
    Touched,
    Wake(Result<WakeOutcome, WakeError>),
}

/// The wake-on-access service.
///
/// Built once from its collaborators and shared by cloning; every clone sees
/// the same registry. Call [`WakeOnAccess::on_access`] before touching a
/// remote resource.
#[derive(Clone)]
pub struct WakeOnAccess {
    registry: Arc<Registry>,
    network: Arc<dyn NetworkProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    jobs: JobRunner,
}

impl WakeOnAccess {
    pub fn new(
        registry: Arc<Registry>,
        network: Arc<dyn NetworkProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        jobs: JobRunner,
    ) -> Self {
        Self {
            registry,
            network,
            notifier,
            clock,
            jobs,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.registry.is_enabled()
    }

    /// Apply the saved on/off state at startup. Unlike `set_enabled` this never
    /// queues discovery.
    pub fn restore_enabled(&self, enabled: bool) {
        self.registry.set_enabled(enabled);
    }

    /// Switch the feature on or off. Switching it on queues hardware id
    /// discovery for every candidate host.
    pub fn set_enabled(&self, enabled: bool, candidates: &dyn CandidateSource) -> Vec<JobHandle> {
        let was_enabled = self.registry.set_enabled(enabled);
        if enabled == was_enabled {
            return Vec::new();
        }

        tracing::info!("Wake on access {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            self.queue_discovery_for_all(candidates)
        } else {
            Vec::new()
        }
    }

    /// Gate an access to `host`, waking it first when due.
    ///
    /// Blocks the calling thread for as long as the wake sequence runs.
    pub fn on_access(&self, host: &str, ctx: &AccessContext<'_>) -> AccessOutcome {
        if !self.is_enabled() {
            return AccessOutcome::Disabled;
        }

        let entry = match self.registry.decide(host, self.clock.now()) {
            Decision::Unknown => return AccessOutcome::UnknownHost,
            Decision::Touched => return AccessOutcome::Touched,
            Decision::Due(entry) => entry,
        };

        tracing::info!(host = %entry.host, "Wake on access triggered by accessing: {}", ctx.trigger);

        let nesting = NestGuard::enter();
        if nesting.is_nested() {
            tracing::warn!("Wake on access called recursively on the same thread [{}]", nesting.level());
        }

        let result = self.wake_host(&entry, ctx.progress);
        drop(nesting);

        self.registry.touch(host, self.clock.now());
        AccessOutcome::Wake(result)
    }

    /// Gate an access to the host part of `url`. URLs without a host are never woken.
    pub fn on_access_url(&self, url: &str, progress: Option<&dyn ProgressReporter>) -> AccessOutcome {
        if !self.is_enabled() {
            return AccessOutcome::Disabled;
        }

        match url_host(url) {
            Some(host) => self.on_access(&host, &AccessContext { trigger: url, progress }),
            None => AccessOutcome::UnknownHost,
        }
    }

    /// Run the wake sequence for `entry` right away, ignoring the throttle
    pub fn wake_host(
        &self,
        entry: &WakeEntry,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<WakeOutcome, WakeError> {
        WakeSequencer::new(
            &self.network,
            &self.jobs,
            self.notifier.as_ref(),
            self.registry.settings(),
        )
        .notify_errors(self.is_enabled())
        .run(entry, progress)
    }

    /// Look up the hardware id of `host` in the background and record it.
    /// Nothing is queued while the feature is disabled.
    pub fn queue_discovery(&self, host: &str) -> Option<JobHandle> {
        if !self.is_enabled() {
            return None;
        }

        let service = self.clone();
        let network = Arc::clone(&self.network);
        let job_host = host.to_string();
        let done_host = host.to_string();

        let job = self.jobs.submit(
            "mac-discovery",
            move |_| discover(network.as_ref(), &job_host),
            move |result| match result {
                Ok(hardware_id) => {
                    service.record_discovery(&done_host, &hardware_id);
                }
                Err(err) => service.discovery_failed(&done_host, &err),
            },
        );
        Some(job)
    }

    pub fn queue_discovery_for_all(&self, source: &dyn CandidateSource) -> Vec<JobHandle> {
        gather_candidates(&[source])
            .iter()
            .filter_map(|host| self.queue_discovery(host))
            .collect()
    }

    /// Store a discovered hardware id and tell the user about changes
    pub fn record_discovery(&self, host: &str, hardware_id: &str) -> Option<UpsertOutcome> {
        tracing::info!("Hardware address discovered for host '{}' -> '{}'", host, hardware_id);

        let outcome = match self.registry.upsert_discovered(host, hardware_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Failed to save discovery result for '{}': {:#}", host, e);
                return None;
            }
        };

        // only bother the user while the feature is on
        if self.is_enabled() {
            let message = match outcome {
                UpsertOutcome::Created => Some(format!("New entry for {}", host)),
                UpsertOutcome::Updated => Some(format!("Updated hardware address for {}", host)),
                UpsertOutcome::Unchanged => None,
            };
            if let Some(message) = message {
                self.notifier.notify(NotifyKind::Info, DISCOVERY_TITLE, &message);
            }
        }

        Some(outcome)
    }

    fn discovery_failed(&self, host: &str, err: &WakeError) {
        tracing::error!("Hardware address discovery failed for host '{}': {}", host, err);

        if self.is_enabled() && err.is_user_visible() {
            self.notifier.notify(
                NotifyKind::Error,
                DISCOVERY_TITLE,
                &format!("Hardware address discovery failed for {}", host),
            );
        }
    }
}

fn url_host(url: &str) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!("Not a URL '{}': {}", url, e);
            return None;
        }
    };

    let host = match parsed.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    (!host.is_empty()).then_some(host)
}
