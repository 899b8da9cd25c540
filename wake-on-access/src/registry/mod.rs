pub mod hash;
pub mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use shared::types::{RegistrySettings, WakeEntry};

pub use store::{RegistryStore, SqliteStore, StoredRegistry};

/// What an access to a host should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Host is not registered; never woken
    Unknown,
    /// Inside the throttle window; the window was pushed forward instead
    Touched,
    /// Wake is due. Carries a snapshot the sequence can work on unlocked.
    Due(WakeEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

struct RegistryState {
    settings: RegistrySettings,
    entries: Vec<WakeEntry>,
}

/// Known wakeable hosts and their throttle state.
///
/// One mutex covers entries and settings. It is only held for the duration of
/// a single decision or update, never across a wake sequence.
pub struct Registry {
    state: Mutex<RegistryState>,
    store: Arc<dyn RegistryStore>,
    enabled: AtomicBool,
    hash_tx: watch::Sender<String>,
}

impl Registry {
    /// Build the registry from whatever `store` holds. A store that can't be
    /// read yields an empty registry. The feature starts disabled.
    pub fn load(store: Arc<dyn RegistryStore>) -> Self {
        let stored = read_store(store.as_ref());
        let (hash_tx, _) = watch::channel(hash::compute_hash(&stored.entries));

        Self {
            state: Mutex::new(RegistryState {
                settings: stored.settings,
                entries: stored.entries,
            }),
            store,
            enabled: AtomicBool::new(false),
            hash_tx,
        }
    }

    /// Replace every entry and the settings with the store's content
    pub fn reload(&self) {
        let stored = read_store(self.store.as_ref());
        let mut state = self.lock();
        state.settings = stored.settings;
        state.entries = stored.entries;
        self.hash_tx.send_replace(hash::compute_hash(&state.entries));
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the previous value
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }

    pub fn settings(&self) -> RegistrySettings {
        self.lock().settings
    }

    pub fn entries(&self) -> Vec<WakeEntry> {
        self.lock().entries.clone()
    }

    pub fn find(&self, host: &str) -> Option<WakeEntry> {
        self.lock().entries.iter().find(|e| e.matches(host)).cloned()
    }

    /// Decide whether accessing `host` at `now` needs a wake. When it doesn't
    /// because the host was seen recently, the throttle window is re-armed.
    pub fn decide(&self, host: &str, now: DateTime<Utc>) -> Decision {
        let mut state = self.lock();

        let Some(entry) = state.entries.iter_mut().find(|e| e.matches(host)) else {
            return Decision::Unknown;
        };

        if entry.is_due(now) {
            Decision::Due(entry.clone())
        } else {
            entry.rearm(now);
            Decision::Touched
        }
    }

    /// Re-arm the throttle window of `host`. Returns false for unknown hosts.
    pub fn touch(&self, host: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        match state.entries.iter_mut().find(|e| e.matches(host)) {
            Some(entry) => {
                entry.rearm(now);
                true
            }
            None => false,
        }
    }

    /// Record a discovered hardware id. New hosts get the default policy and
    /// are due immediately. Any change is persisted.
    pub fn upsert_discovered(&self, host: &str, hardware_id: &str) -> Result<UpsertOutcome> {
        if host.is_empty() || hardware_id.is_empty() {
            bail!("Refusing entry with empty host or hardware id");
        }

        let mut state = self.lock();

        // work on a copy; memory only changes once the store has it
        let mut entries = state.entries.clone();
        let outcome = match entries.iter_mut().find(|e| e.matches(host)) {
            Some(entry) if entry.hardware_id.eq_ignore_ascii_case(hardware_id) => {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(entry) => {
                tracing::debug!("Update existing entry for host '{}'", host);
                entry.hardware_id = hardware_id.to_string();
                UpsertOutcome::Updated
            }
            None => {
                tracing::debug!("Create new entry for host '{}'", host);
                entries.push(WakeEntry::new(host, hardware_id));
                UpsertOutcome::Created
            }
        };

        self.persist(state.settings, &entries)?;
        state.entries = entries;
        Ok(outcome)
    }

    pub fn subscribe_hash(&self) -> watch::Receiver<String> {
        self.hash_tx.subscribe()
    }

    fn persist(&self, settings: RegistrySettings, entries: &[WakeEntry]) -> Result<()> {
        self.store.save(&StoredRegistry {
            settings,
            entries: entries.to_vec(),
        })?;
        self.hash_tx.send_replace(hash::compute_hash(entries));
        Ok(())
    }
}

fn read_store(store: &dyn RegistryStore) -> StoredRegistry {
    let stored = match store.load() {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            tracing::info!("No saved wake registry, starting empty");
            return StoredRegistry::default();
        }
        Err(e) => {
            tracing::error!("Failed to load wake registry, starting empty: {:#}", e);
            return StoredRegistry::default();
        }
    };

    tracing::info!(
        "Loaded wake registry: network init timeout {}s, network settle time {}ms",
        stored.settings.network_init_timeout_secs,
        stored.settings.network_settle_ms
    );
    for entry in &stored.entries {
        tracing::info!(
            host = %entry.host,
            hardware_id = %entry.hardware_id,
            ping_port = entry.ping_port,
            ping_mode = entry.ping_mode,
            throttle_secs = entry.throttle_secs,
            wait_online_secs = entry.wait_online_secs,
            wait_online_extended_secs = entry.wait_online_extended_secs,
            wait_services_secs = entry.wait_services_secs,
            "Registered wake entry"
        );
    }

    stored
}
