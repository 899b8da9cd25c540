use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use shared::types::{RegistrySettings, WakeEntry};
use crate::collab::{NetworkProvider, Notifier, NotifyKind, ProgressReporter};
use crate::error::WakeError;
use crate::jobs::JobRunner;
use crate::nesting;
use crate::wait::condition::without_readability;
use crate::wait::{probe_host, wait_for, ProgressSession, WaitCondition, WaitResult};

/// Probe timeout for the "already awake?" check, short so it never blocks long
pub const QUICK_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

pub const LABEL_WAIT_NETWORK: &str = "Waiting for network to connect...";
pub const LABEL_WAIT_ONLINE: &str = "Waiting for host to wake up...";
pub const LABEL_WAIT_ONLINE_EXTENDED: &str = "Extended wait for host to wake up...";
pub const LABEL_WAIT_SERVICES: &str = "Waiting for services to start...";
pub const MESSAGE_SEND_FAILED: &str = "Failed to send wake-up signal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakePhase {
    AwaitNetwork,
    QuickCheck,
    SendSignal,
    AwaitOnlinePrimary,
    AwaitOnlineExtended,
    AwaitServices,
    Done,
}

impl fmt::Display for WakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WakePhase::AwaitNetwork => "await-network",
            WakePhase::QuickCheck => "quick-check",
            WakePhase::SendSignal => "send-signal",
            WakePhase::AwaitOnlinePrimary => "await-online",
            WakePhase::AwaitOnlineExtended => "await-online-extended",
            WakePhase::AwaitServices => "await-services",
            WakePhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// Host answered the quick check; no signal was sent
    AlreadyAwake,
    /// Signal sent, host answered, services grace period elapsed
    Woken,
}

/// Progress heading for a wake of `host`
pub fn heading(host: &str) -> String {
    format!("Waking up {}", host)
}

/// Runs the wake procedure for one host: network, quick check, signal,
/// two-phase online wait, services grace wait. Phases run strictly in that
/// order and the first failure ends the run.
pub struct WakeSequencer<'a> {
    network: &'a Arc<dyn NetworkProvider>,
    jobs: &'a JobRunner,
    notifier: &'a dyn Notifier,
    settings: RegistrySettings,
    notify_errors: bool,
}

impl<'a> WakeSequencer<'a> {
    pub fn new(
        network: &'a Arc<dyn NetworkProvider>,
        jobs: &'a JobRunner,
        notifier: &'a dyn Notifier,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            network,
            jobs,
            notifier,
            settings,
            notify_errors: true,
        }
    }

    /// Whether user-visible failures go to the notifier
    pub fn notify_errors(mut self, notify: bool) -> Self {
        self.notify_errors = notify;
        self
    }

    pub fn run(
        &self,
        entry: &WakeEntry,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<WakeOutcome, WakeError> {
        let title = heading(&entry.host);
        let session = progress.map(|reporter| {
            let level = nesting::level();
            if level > 1 {
                ProgressSession::open(reporter, &format!("{} (nesting {})", title, level))
            } else {
                ProgressSession::open(reporter, &title)
            }
        });

        self.enter(entry, WakePhase::AwaitNetwork, session.as_ref(), Some(LABEL_WAIT_NETWORK));
        {
            let mut network_ready = WaitCondition::network_ready(
                self.network.as_ref(),
                Duration::from_millis(self.settings.network_settle_ms),
            );
            let timeout = Duration::from_secs(self.settings.network_init_timeout_secs);

            match wait_for(&mut network_ready, timeout, progress) {
                WaitResult::Success => {}
                WaitResult::TimedOut => {
                    return Err(self.abort(entry, WakePhase::AwaitNetwork, WakeError::NetworkNotReady {
                        timeout_secs: self.settings.network_init_timeout_secs,
                    }));
                }
                WaitResult::Canceled => {
                    return Err(self.abort(entry, WakePhase::AwaitNetwork, WakeError::Canceled));
                }
            }
        }

        self.enter(entry, WakePhase::QuickCheck, None, None);
        if probe_host(
            self.network.as_ref(),
            entry,
            QUICK_CHECK_TIMEOUT,
            without_readability(entry.ping_mode),
        ) {
            tracing::info!(host = %entry.host, "Host already running, no wake needed");
            return Ok(WakeOutcome::AlreadyAwake);
        }

        self.enter(entry, WakePhase::SendSignal, None, None);
        if entry.hardware_id.is_empty() || !self.network.send_wake_signal(&entry.hardware_id) {
            let err = WakeError::SignalSendFailure {
                hardware_id: entry.hardware_id.clone(),
            };
            tracing::error!(host = %entry.host, "{}", err);
            if self.notify_errors {
                self.notifier.notify(NotifyKind::Error, &title, MESSAGE_SEND_FAILED);
            }
            return Err(err);
        }

        {
            // one prober for both online phases; the extended wait continues it
            let jobs = progress.map(|_| self.jobs);
            let mut online = WaitCondition::liveness(self.network, entry, jobs);

            let mut phase = WakePhase::AwaitOnlinePrimary;
            self.enter(entry, phase, session.as_ref(), Some(LABEL_WAIT_ONLINE));
            let mut result = wait_for(
                &mut online,
                Duration::from_secs(entry.wait_online_secs),
                progress,
            );

            if result == WaitResult::TimedOut {
                phase = WakePhase::AwaitOnlineExtended;
                self.enter(
                    entry,
                    phase,
                    session.as_ref(),
                    Some(LABEL_WAIT_ONLINE_EXTENDED),
                );
                result = wait_for(
                    &mut online,
                    Duration::from_secs(entry.wait_online_extended_secs),
                    progress,
                );
            }

            match result {
                WaitResult::Success => {}
                WaitResult::TimedOut => {
                    return Err(self.abort(entry, phase, WakeError::NoResponse {
                        host: entry.host.clone(),
                        waited_secs: entry.wait_online_secs + entry.wait_online_extended_secs,
                    }));
                }
                WaitResult::Canceled => {
                    return Err(self.abort(entry, phase, WakeError::Canceled));
                }
            }
        }

        self.enter(entry, WakePhase::AwaitServices, session.as_ref(), Some(LABEL_WAIT_SERVICES));
        let services = wait_for(
            &mut WaitCondition::Fixed,
            Duration::from_secs(entry.wait_services_secs),
            progress,
        );
        if services == WaitResult::Canceled {
            return Err(self.abort(entry, WakePhase::AwaitServices, WakeError::Canceled));
        }

        self.enter(entry, WakePhase::Done, None, None);
        tracing::info!(host = %entry.host, "Wake sequence completed, host started");
        Ok(WakeOutcome::Woken)
    }

    fn enter(
        &self,
        entry: &WakeEntry,
        phase: WakePhase,
        session: Option<&ProgressSession<'_>>,
        label: Option<&str>,
    ) {
        tracing::debug!(host = %entry.host, %phase, "Wake phase");
        if let (Some(session), Some(label)) = (session, label) {
            session.set_label(label);
        }
    }

    fn abort(&self, entry: &WakeEntry, phase: WakePhase, err: WakeError) -> WakeError {
        tracing::info!(host = %entry.host, %phase, "Wake sequence aborted: {}", err);
        err
    }
}
