pub mod condition;

use std::time::{Duration, Instant};
use crate::collab::ProgressReporter;

pub use condition::{probe_host, AsyncProbe, NetworkReady, SyncProbe, WaitCondition, PROBE_TIMEOUT};

/// Poll cadence while a progress display is up
pub const POLL_INTERVAL_INTERACTIVE: Duration = Duration::from_millis(20);
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Lowest percentage ever reported, so the indicator never sits at zero
pub const MIN_PERCENT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Success,
    TimedOut,
    Canceled,
}

/// Block the calling thread until `condition` holds, `timeout` passes, or the
/// progress reporter says the user canceled.
///
/// Cancellation is checked once per poll, so it is observed within one poll
/// interval. A zero timeout returns `TimedOut` without checking the condition.
pub fn wait_for(
    condition: &mut WaitCondition<'_>,
    timeout: Duration,
    progress: Option<&dyn ProgressReporter>,
) -> WaitResult {
    if let Some(progress) = progress {
        progress.set_percent(MIN_PERCENT);
    }

    let interval = if progress.is_some() {
        POLL_INTERVAL_INTERACTIVE
    } else {
        POLL_INTERVAL
    };

    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return WaitResult::TimedOut;
        }

        if condition.is_satisfied() {
            return WaitResult::Success;
        }

        if let Some(progress) = progress {
            if progress.is_canceled() {
                return WaitResult::Canceled;
            }
            progress.set_percent(percent_elapsed(start.elapsed(), timeout));
        }

        std::thread::sleep(interval.min(deadline.saturating_duration_since(Instant::now())));
    }
}

fn percent_elapsed(elapsed: Duration, timeout: Duration) -> u8 {
    let total = timeout.as_millis().max(1);
    let percent = (elapsed.as_millis() * 100 / total).min(100) as u8;
    percent.max(MIN_PERCENT)
}

/// An open progress display for the length of one wake sequence
pub struct ProgressSession<'a> {
    reporter: &'a dyn ProgressReporter,
}

impl<'a> ProgressSession<'a> {
    pub fn open(reporter: &'a dyn ProgressReporter, heading: &str) -> Self {
        reporter.open(heading);
        Self { reporter }
    }

    pub fn set_label(&self, line: &str) {
        self.reporter.set_label(line);
    }
}

impl Drop for ProgressSession<'_> {
    fn drop(&mut self) {
        self.reporter.close();
    }
}
