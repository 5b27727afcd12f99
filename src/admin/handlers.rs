use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStatsSnapshot;
use crate::http::server::AppState;
use crate::proxy::EndpointConfig;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: usize,
    pub cache_enabled: bool,
    pub valid_status_codes: Vec<u16>,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub enabled: bool,
    pub ttl_secs: u64,
    #[serde(flatten)]
    pub stats: CacheStatsSnapshot,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let connector = state.forwarder.executor();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        endpoints: state.forwarder.endpoints().map_or(0, |table| table.len()),
        cache_enabled: connector.cache().is_enabled(),
        valid_status_codes: connector.policy().codes().collect(),
    })
}

/// Endpoint table without passwords (`auth_pass` is never serialized).
pub async fn get_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointConfig>> {
    let endpoints = state
        .forwarder
        .endpoints()
        .map(|table| table.iter().cloned().collect())
        .unwrap_or_default();
    Json(endpoints)
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStatus> {
    let connector = state.forwarder.executor();
    Json(CacheStatus {
        enabled: connector.cache().is_enabled(),
        ttl_secs: connector.cache_ttl().as_secs(),
        stats: connector.cache().stats(),
    })
}
