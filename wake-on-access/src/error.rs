/// Terminal outcomes of a wake or discovery attempt. None of them is retried
/// within the attempt, and none reaches the caller of the access gate as a
/// hard failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeError {
    #[error("can't determine address of '{host}'")]
    AddressResolutionFailure { host: String },

    #[error("network did not become ready within {timeout_secs}s")]
    NetworkNotReady { timeout_secs: u64 },

    #[error("failed to send wake signal to {hardware_id} (is it blocked by a firewall?)")]
    SignalSendFailure { hardware_id: String },

    #[error("no response from '{host}' after {waited_secs}s")]
    NoResponse { host: String, waited_secs: u64 },

    #[error("canceled by user")]
    Canceled,

    #[error("no hardware address found for '{host}'")]
    DiscoveryFailure { host: String },
}

impl WakeError {
    /// Errors the user is told about through the notifier; the rest are only logged.
    /// An unresolvable host is a discovery failure as far as the user is concerned.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            WakeError::SignalSendFailure { .. }
                | WakeError::DiscoveryFailure { .. }
                | WakeError::AddressResolutionFailure { .. }
        )
    }
}
