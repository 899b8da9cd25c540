mod api;
mod config;
mod discovery_manager;
mod mdns;
mod net;
mod notify;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use wake_on_access::{JobRunner, Registry, SqliteStore, SystemClock, WakeOnAccess};
use crate::config::Config;
use crate::net::SystemNetwork;
use crate::notify::LogNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wakeonaccessd=info,wake_on_access=info"))
        )
        .init();

    tracing::info!("Starting wakeonaccessd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/wake-on-access/wakeonaccessd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Open registry store
    let store = SqliteStore::open(&config.wake.registry_path)?;
    tracing::info!("Opened registry at {:?}", config.wake.registry_path);

    let registry = Arc::new(Registry::load(Arc::new(store)));
    let hash_rx = registry.subscribe_hash();
    tracing::info!("Initial registry hash: {}", *hash_rx.borrow());

    let woa = WakeOnAccess::new(
        registry,
        Arc::new(SystemNetwork::new()),
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        JobRunner::new(tokio::runtime::Handle::current()),
    );
    // the discovery manager's first round covers the configured hosts
    woa.restore_enabled(config.wake.enabled);

    // Create mDNS daemon, optionally bound to one interface
    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;
    if let Some(interface) = &config.discovery.interface {
        mdns_daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        mdns_daemon
            .enable_interface(interface.as_str())
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn discovery manager task
    let mgr_cancel = cancel.clone();
    let mgr_woa = woa.clone();
    let mgr_daemon = mdns_daemon.clone();
    let mgr_config = config.discovery.clone();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = discovery_manager::run(mgr_woa, mgr_daemon, mgr_config, mgr_cancel).await {
            tracing::error!("Discovery manager error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        woa,
        hash_rx,
        candidates: Arc::new(config.discovery.hosts.clone()),
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();

    let _ = tokio::join!(mgr_handle, server_handle);

    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
