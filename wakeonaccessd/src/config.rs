use std::path::{Path, PathBuf};
use serde::Deserialize;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// SQLite file holding wake entries and the global wait settings
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Hosts always considered for hardware id discovery
    #[serde(default)]
    pub hosts: Vec<String>,
    /// mDNS service types whose hosts are discovery candidates too
    #[serde(default = "default_service_types")]
    pub mdns_service_types: Vec<String>,
    /// Restrict mDNS to one interface; all interfaces when unset
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_browse_secs")]
    pub browse_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_enabled() -> bool {
    true
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("/var/lib/wake-on-access/registry.db")
}

fn default_service_types() -> Vec<String> {
    vec![
        "_smb._tcp.local.".to_string(),
        "_nfs._tcp.local.".to_string(),
    ]
}

fn default_browse_secs() -> u64 {
    5
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            registry_path: default_registry_path(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            mdns_service_types: default_service_types(),
            interface: None,
            browse_secs: default_browse_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
