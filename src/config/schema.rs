//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults, so an empty file is a valid config with
//! no endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::policy::PROXY_STATUS_CODES;
use crate::connector::Representation;
use crate::proxy::EndpointConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Outbound connector settings.
    pub connector: ConnectorConfig,

    /// Upstream endpoint table.
    pub endpoints: Vec<EndpointConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,

    /// Total time allowed for one inbound request.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Outbound connector settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Upstream timeout per request.
    pub timeout_secs: u64,

    /// Cache upstream responses in memory.
    pub cache_enabled: bool,

    /// Lifetime of a cached response.
    pub cache_ttl_secs: u64,

    /// How often expired cache entries are swept out.
    pub cache_purge_interval_secs: u64,

    /// Status codes treated as non-fatal.
    pub valid_status_codes: Vec<u16>,

    /// Representation used when the client does not ask for one.
    pub default_response_type: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 2,
            cache_enabled: true,
            cache_ttl_secs: 3600,
            cache_purge_interval_secs: 60,
            valid_status_codes: PROXY_STATUS_CODES.to_vec(),
            default_response_type: Representation::default().as_str().to_string(),
        }
    }
}

impl ConnectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache_purge_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    #[serde(skip_serializing)]
    pub api_key: String,
}
