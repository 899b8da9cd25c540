use std::path::{Path, PathBuf};
use std::sync::Mutex;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use shared::types::{RegistrySettings, WakeEntry};

const KEY_NETWORK_INIT: &str = "netinittimeout";
const KEY_NETWORK_SETTLE: &str = "netsettletime";

/// Everything the registry persists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRegistry {
    pub settings: RegistrySettings,
    pub entries: Vec<WakeEntry>,
}

/// Persistence for the registry. Every save is a full rewrite.
pub trait RegistryStore: Send + Sync {
    /// `None` if nothing was ever saved
    fn load(&self) -> Result<Option<StoredRegistry>>;

    fn save(&self, registry: &StoredRegistry) -> Result<()>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the registry database.
    ///
    /// A file that exists but is not a usable database is moved aside to
    /// `<name>.corrupt` and replaced by an empty one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = match open_connection(path) {
            Ok(conn) => conn,
            Err(e) if path.is_file() => {
                let aside = corrupt_path(path);
                tracing::error!(
                    "Registry database {} is unusable ({:#}), moving it to {}",
                    path.display(),
                    e,
                    aside.display()
                );
                std::fs::rename(path, &aside)
                    .with_context(|| format!("Failed to move aside {}", path.display()))?;
                open_connection(path)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .context("Failed to enable WAL mode")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS wake_entries (
            position           INTEGER PRIMARY KEY,
            host               TEXT NOT NULL UNIQUE COLLATE NOCASE,
            hardware_id        TEXT NOT NULL,
            ping_port          INTEGER NOT NULL DEFAULT 0,
            ping_mode          INTEGER NOT NULL DEFAULT 0,
            timeout_secs       INTEGER NOT NULL,
            wait_online_secs   INTEGER NOT NULL,
            wait_online2_secs  INTEGER NOT NULL,
            wait_services_secs INTEGER NOT NULL
        );
        "#,
    )
    .context("Failed to create database schema")?;

    Ok(conn)
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

impl RegistryStore for SqliteStore {
    fn load(&self) -> Result<Option<StoredRegistry>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let mut stmt = conn
            .prepare("SELECT key, value FROM settings")
            .context("Failed to prepare settings query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .context("Failed to query settings")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect settings")?;

        let mut stmt = conn
            .prepare(
                "SELECT host, hardware_id, ping_port, ping_mode, timeout_secs,
                        wait_online_secs, wait_online2_secs, wait_services_secs
                 FROM wake_entries ORDER BY position",
            )
            .context("Failed to prepare entries query")?;
        let raw_entries = stmt
            .query_map([], row_to_entry)
            .context("Failed to query entries")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect entries")?;

        if rows.is_empty() && raw_entries.is_empty() {
            return Ok(None);
        }

        let mut settings = RegistrySettings::default();
        for (key, value) in rows {
            let value = value.max(0) as u64;
            match key.as_str() {
                KEY_NETWORK_INIT => settings.network_init_timeout_secs = value,
                KEY_NETWORK_SETTLE => settings.network_settle_ms = value,
                other => tracing::debug!("Ignoring unknown setting '{}'", other),
            }
        }

        let mut entries: Vec<WakeEntry> = Vec::with_capacity(raw_entries.len());
        for mut entry in raw_entries {
            if entry.host.is_empty() {
                tracing::error!("Skipping stored entry with empty host");
                continue;
            }
            if entry.hardware_id.is_empty() {
                tracing::error!("Skipping stored entry '{}' with empty hardware id", entry.host);
                continue;
            }
            if entries.iter().any(|e| e.matches(&entry.host)) {
                tracing::warn!("Skipping duplicate stored entry '{}'", entry.host);
                continue;
            }
            entry.clamp_policy();
            entries.push(entry);
        }

        Ok(Some(StoredRegistry {
            settings: settings.clamped(),
            entries,
        }))
    }

    fn save(&self, registry: &StoredRegistry) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute("DELETE FROM settings", [])
            .context("Failed to clear settings")?;
        tx.execute("DELETE FROM wake_entries", [])
            .context("Failed to clear entries")?;

        tx.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2), (?3, ?4)",
            params![
                KEY_NETWORK_INIT,
                registry.settings.network_init_timeout_secs as i64,
                KEY_NETWORK_SETTLE,
                registry.settings.network_settle_ms as i64,
            ],
        )
        .context("Failed to save settings")?;

        for (position, entry) in registry.entries.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO wake_entries (
                    position, host, hardware_id, ping_port, ping_mode, timeout_secs,
                    wait_online_secs, wait_online2_secs, wait_services_secs
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    position as i64,
                    &entry.host,
                    &entry.hardware_id,
                    entry.ping_port,
                    entry.ping_mode,
                    entry.throttle_secs as i64,
                    entry.wait_online_secs as i64,
                    entry.wait_online_extended_secs as i64,
                    entry.wait_services_secs as i64,
                ],
            )
            .with_context(|| format!("Failed to save entry for {}", entry.host))?;
        }

        tx.commit().context("Failed to commit registry")?;
        Ok(())
    }
}

/// Helper to convert a database row to a WakeEntry
fn row_to_entry(row: &rusqlite::Row) -> Result<WakeEntry, rusqlite::Error> {
    let secs = |idx: usize| -> Result<u64, rusqlite::Error> { Ok(row.get::<_, i64>(idx)?.max(0) as u64) };
    let small = |idx: usize| -> Result<u16, rusqlite::Error> {
        let value: i64 = row.get(idx)?;
        Ok(value.clamp(0, u16::MAX as i64) as u16)
    };

    Ok(WakeEntry {
        host: row.get(0)?,
        hardware_id: row.get(1)?,
        ping_port: small(2)?,
        ping_mode: small(3)?,
        throttle_secs: secs(4)?,
        next_allowed_wake: None,
        wait_online_secs: secs(5)?,
        wait_online_extended_secs: secs(6)?,
        wait_services_secs: secs(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(host: &str) -> WakeEntry {
        let mut entry = WakeEntry::new(host, "AA:BB:CC:DD:EE:FF");
        entry.ping_port = 445;
        entry.ping_mode = 1;
        entry.throttle_secs = 120;
        entry.wait_online_secs = 30;
        entry.wait_online_extended_secs = 90;
        entry.wait_services_secs = 7;
        entry
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let mut second = test_entry("media.lan");
        second.hardware_id = "00:11:22:33:44:55".to_string();
        second.ping_port = 0;
        second.ping_mode = 0;

        let saved = StoredRegistry {
            settings: RegistrySettings {
                network_init_timeout_secs: 45,
                network_settle_ms: 1500,
            },
            entries: vec![test_entry("nas.local"), second],
        };

        SqliteStore::open(&path).unwrap().save(&saved).unwrap();

        let loaded = SqliteStore::open(&path).unwrap().load().unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_save_is_full_rewrite() {
        let store = SqliteStore::open(":memory:").unwrap();

        let mut registry = StoredRegistry {
            settings: RegistrySettings::default(),
            entries: vec![test_entry("a.local"), test_entry("b.local")],
        };
        store.save(&registry).unwrap();

        registry.entries.remove(0);
        store.save(&registry).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].host, "b.local");
    }

    #[test]
    fn test_load_skips_invalid_rows_and_clamps() {
        let store = SqliteStore::open(":memory:").unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute_batch(
                r#"
                INSERT INTO settings (key, value) VALUES ('netinittimeout', 9999), ('netsettletime', 200);
                INSERT INTO wake_entries VALUES (0, 'nas.local', 'AA:BB:CC:DD:EE:FF', 0, 0, 1, 5000, 40, 40);
                INSERT INTO wake_entries VALUES (1, 'nomac.local', '', 0, 0, 300, 40, 40, 5);
                INSERT INTO wake_entries VALUES (2, '', 'AA:BB:CC:DD:EE:00', 0, 0, 300, 40, 40, 5);
                "#,
            )
            .unwrap();
        }

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.settings.network_init_timeout_secs, 300);
        assert_eq!(loaded.settings.network_settle_ms, 200);
        assert_eq!(loaded.entries.len(), 1);

        let entry = &loaded.entries[0];
        assert_eq!(entry.throttle_secs, 10);
        assert_eq!(entry.wait_online_secs, 600);
        assert!(entry.next_allowed_wake.is_none());
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        std::fs::write(&path, b"<onaccesswakeup>not a database, not even close</onaccesswakeup>").unwrap();

        let store = SqliteStore::open(&path).unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(dir.path().join("registry.db.corrupt").exists());
    }

    mod round_trip {
        use proptest::prelude::*;
        use shared::protocol::{
            NETWORK_INIT_RANGE, NETWORK_SETTLE_RANGE, THROTTLE_RANGE, WAIT_ONLINE_RANGE,
            WAIT_SERVICES_RANGE,
        };
        use shared::types::{RegistrySettings, WakeEntry};
        use crate::registry::store::{RegistryStore, SqliteStore, StoredRegistry};

        fn entry_strategy() -> impl Strategy<Value = (String, u16, u16, u64, u64, u64, u64)> {
            (
                "[0-9A-F]{2}(:[0-9A-F]{2}){5}",
                any::<u16>(),
                0u16..4,
                THROTTLE_RANGE,
                WAIT_ONLINE_RANGE,
                WAIT_ONLINE_RANGE,
                WAIT_SERVICES_RANGE,
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 32,
                .. ProptestConfig::default()
            })]

            #[test]
            fn test_valid_registry_survives_save_and_load(
                init in NETWORK_INIT_RANGE,
                settle in NETWORK_SETTLE_RANGE,
                raw in proptest::collection::vec(entry_strategy(), 0..8),
            ) {
                let entries: Vec<WakeEntry> = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, (hardware_id, ping_port, ping_mode, throttle, online, extended, services))| WakeEntry {
                        host: format!("host{}.local", i),
                        hardware_id,
                        ping_port,
                        ping_mode,
                        throttle_secs: throttle,
                        next_allowed_wake: None,
                        wait_online_secs: online,
                        wait_online_extended_secs: extended,
                        wait_services_secs: services,
                    })
                    .collect();
                let saved = StoredRegistry {
                    settings: RegistrySettings {
                        network_init_timeout_secs: init,
                        network_settle_ms: settle,
                    },
                    entries,
                };

                let store = SqliteStore::open(":memory:").unwrap();
                store.save(&saved).unwrap();

                prop_assert_eq!(store.load().unwrap(), Some(saved));
            }
        }
    }
}
