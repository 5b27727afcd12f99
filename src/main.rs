//! Upstream gateway.
//!
//! Serves `ANY /{endpoint}/{*path}` and relays each request to the named
//! upstream endpoint through the caching connector.
//!
//! ```text
//!  Client ──▶ axum router ──▶ ProxyForwarder ──▶ Connector ──▶ Upstream
//!                 │                                  │
//!                 └── /admin (bearer key)            └── MemoryCache
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use upstream_connector::config::loader::load_config;
use upstream_connector::config::watcher::ConfigWatcher;
use upstream_connector::http::GatewayServer;
use upstream_connector::lifecycle::{signals, startup, Shutdown};
use upstream_connector::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "upstream-gateway", version, about = "Caching reverse proxy for named upstream endpoints")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Reload the endpoint table when the config file changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_tracing(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "upstream-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let forwarder = Arc::new(startup::build_forwarder(&config)?);
    let shutdown = Shutdown::new();

    let cache = forwarder.executor().cache();
    if cache.is_enabled() {
        startup::spawn_purge_task(
            cache.clone(),
            config.connector.cache_purge_interval(),
            shutdown.subscribe(),
        );
    }

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = if cli.watch {
        let (watcher, updates) = ConfigWatcher::watch(&cli.config)?;
        startup::spawn_reload_task(forwarder.clone(), updates, shutdown.subscribe());
        Some(watcher)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::listen(shutdown.clone()));

    let server = GatewayServer::new(config, forwarder);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
