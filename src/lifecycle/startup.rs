//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the connector and forwarder from a validated config
//! - Apply endpoint table reloads to the running forwarder
//! - Sweep expired cache entries on a fixed interval
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - An empty endpoint table is allowed at startup; calls then fail with a
//!   configuration error until a reload installs endpoints

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::cache::{CacheGateway, MemoryCache};
use crate::config::schema::GatewayConfig;
use crate::connector::transport::ReqwestTransport;
use crate::connector::Connector;
use crate::error::ConnectorResult;
use crate::proxy::ProxyForwarder;

/// Build the proxy connector described by `config.connector`.
pub fn build_connector(config: &GatewayConfig) -> ConnectorResult<Connector> {
    let settings = &config.connector;

    let mut connector = Connector::for_proxy(Arc::new(ReqwestTransport::new()))
        .with_timeout(settings.timeout())
        .with_cache_ttl(settings.cache_ttl());
    connector.set_valid_status_codes(settings.valid_status_codes.iter().copied())?;

    if settings.cache_enabled {
        connector.set_cache_store(Arc::new(MemoryCache::new()));
    }

    tracing::info!(
        timeout_secs = settings.timeout_secs,
        cache_enabled = settings.cache_enabled,
        cache_ttl_secs = settings.cache_ttl_secs,
        valid_status_codes = %connector.policy().describe(),
        "Connector initialized"
    );
    Ok(connector)
}

/// Build the forwarder with its connector and endpoint table.
pub fn build_forwarder(config: &GatewayConfig) -> ConnectorResult<ProxyForwarder> {
    let forwarder = ProxyForwarder::new(build_connector(config)?);

    if config.endpoints.is_empty() {
        tracing::warn!("No endpoints configured, every proxied call will fail until a reload");
    } else {
        forwarder.set_endpoints(config.endpoints.iter().cloned())?;
    }
    Ok(forwarder)
}

/// Install the endpoint table from a reloaded config.
///
/// Returns false when the new table was rejected and the old one kept.
pub fn apply_reload(forwarder: &ProxyForwarder, config: &GatewayConfig) -> bool {
    match forwarder.set_endpoints(config.endpoints.iter().cloned()) {
        Ok(()) => {
            tracing::info!(endpoints = config.endpoints.len(), "Endpoint table reloaded");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected reloaded endpoint table, keeping current one");
            false
        }
    }
}

/// Apply config updates until shutdown or until the watcher goes away.
pub fn spawn_reload_task(
    forwarder: Arc<ProxyForwarder>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(config) => {
                        apply_reload(&forwarder, &config);
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Reload task stopped");
    })
}

/// Purge expired cache entries every `period` until shutdown.
///
/// Entries whose key is never requested again are otherwise kept forever.
pub fn spawn_purge_task(
    cache: CacheGateway,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Purged expired cache entries");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Cache purge task stopped");
    })
}
