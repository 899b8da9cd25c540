use wake_on_access::{Notifier, NotifyKind};

/// Notifications for a headless daemon: they end up in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotifyKind, title: &str, message: &str) {
        match kind {
            NotifyKind::Info => tracing::info!(title, "{}", message),
            NotifyKind::Error => tracing::error!(title, "{}", message),
        }
    }
}
