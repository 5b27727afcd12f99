//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the endpoint table (names, base URIs, duplicates)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::connector::Representation;

/// Path segment reserved for the admin API.
pub const ADMIN_SEGMENT: &str = "admin";

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("connector.valid_status_codes cannot be empty")]
    EmptyStatusCodes,

    #[error("connector.valid_status_codes contains {0}, which is not an HTTP status")]
    InvalidStatusCode(u16),

    #[error("connector.default_response_type `{0}` is unknown")]
    UnknownResponseType(String),

    #[error("endpoint #{0} has an empty name")]
    EmptyEndpointName(usize),

    #[error("endpoint `{name}` has an invalid base URI `{endpoint}`")]
    InvalidEndpointUri { name: String, endpoint: String },

    #[error("endpoint `{0}` is defined more than once")]
    DuplicateEndpoint(String),

    #[error("endpoint `{0}` collides with the admin routes")]
    ReservedEndpoint(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Check a parsed config, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_body_bytes"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("listener.request_timeout_secs"));
    }

    let connector = &config.connector;
    if connector.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("connector.timeout_secs"));
    }
    if connector.cache_enabled && connector.cache_purge_interval_secs == 0 {
        errors.push(ValidationError::ZeroValue("connector.cache_purge_interval_secs"));
    }
    if connector.valid_status_codes.is_empty() {
        errors.push(ValidationError::EmptyStatusCodes);
    }
    for code in &connector.valid_status_codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::InvalidStatusCode(*code));
        }
    }
    if connector
        .default_response_type
        .parse::<Representation>()
        .is_err()
    {
        errors.push(ValidationError::UnknownResponseType(
            connector.default_response_type.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.name.trim().is_empty() {
            errors.push(ValidationError::EmptyEndpointName(index));
            continue;
        }
        let valid_uri = Url::parse(&endpoint.endpoint)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid_uri {
            errors.push(ValidationError::InvalidEndpointUri {
                name: endpoint.name.clone(),
                endpoint: endpoint.endpoint.clone(),
            });
        }
        if !seen.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.name.clone()));
        }
        if config.admin.enabled && endpoint.name == ADMIN_SEGMENT {
            errors.push(ValidationError::ReservedEndpoint(endpoint.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
