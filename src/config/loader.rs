//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::proxy::endpoints::{missing_key, REQUIRED_KEYS};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Endpoint ({endpoint}) is not defined correctly, the config key ({key}) is not defined")]
    MissingEndpointKey { endpoint: String, key: &'static str },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
///
/// Endpoint entries are checked for every mandatory key before typed
/// deserialization, so the error names the missing key.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;
    check_endpoint_keys(&table)?;

    let config: GatewayConfig = toml::Value::Table(table).try_into()?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn check_endpoint_keys(table: &toml::Table) -> Result<(), ConfigError> {
    let Some(toml::Value::Array(endpoints)) = table.get("endpoints") else {
        return Ok(());
    };

    for (index, entry) in endpoints.iter().enumerate() {
        let label = entry
            .get("name")
            .and_then(toml::Value::as_str)
            .map_or_else(|| format!("#{index}"), str::to_string);

        let Some(entry) = entry.as_table() else {
            return Err(ConfigError::MissingEndpointKey {
                endpoint: label,
                key: REQUIRED_KEYS[0],
            });
        };

        if let Some(key) = missing_key(|key| entry.contains_key(key)) {
            return Err(ConfigError::MissingEndpointKey {
                endpoint: label,
                key,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [listener]
        bind_address = "127.0.0.1:9000"

        [connector]
        timeout_secs = 5
        cache_ttl_secs = 60
        valid_status_codes = [200, 404]
        default_response_type = "text"

        [[endpoints]]
        name = "users"
        endpoint = "http://users.internal"
        auth = true
        auth_type = "basic"
        auth_user = "svc"
        auth_pass = "secret"
        proxy = true
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(FULL).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.connector.timeout_secs, 5);
        assert_eq!(config.connector.valid_status_codes, vec![200, 404]);
        assert!(config.connector.cache_enabled);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].auth_user, "svc");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.connector.timeout_secs, 2);
        assert_eq!(config.connector.cache_ttl_secs, 3600);
        assert_eq!(config.connector.default_response_type, "json");
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_missing_endpoint_key_is_named() {
        let content = r#"
            [[endpoints]]
            name = "users"
            endpoint = "http://users.internal"
            auth = false
            auth_type = "none"
            auth_pass = ""
            proxy = true
        "#;

        let err = parse_config(content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEndpointKey { ref endpoint, key: "auth_user" } if endpoint == "users"
        ));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let err = parse_config("[connector]\nvalid_status_codes = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("valid_status_codes cannot be empty"));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse_config("[listener"),
            Err(ConfigError::Parse(_))
        ));
    }
}
