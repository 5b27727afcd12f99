//! Endpoint table: upstream name -> base URI and auth settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ConnectorError, ConnectorResult};

/// Keys every endpoint entry must define.
pub const REQUIRED_KEYS: [&str; 7] = [
    "name",
    "endpoint",
    "auth",
    "auth_type",
    "auth_user",
    "auth_pass",
    "proxy",
];

/// One upstream the forwarder can reach.
///
/// Auth settings are carried for callers and passed through untouched; the
/// forwarder never computes credentials itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    /// Base URI, e.g. `http://users.internal:8080`.
    pub endpoint: String,
    pub auth: bool,
    pub auth_type: String,
    pub auth_user: String,
    #[serde(skip_serializing)]
    pub auth_pass: String,
    pub proxy: bool,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .field("auth_type", &self.auth_type)
            .field("auth_user", &self.auth_user)
            .field("auth_pass", &"<redacted>")
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Validated, non-empty set of endpoints keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    entries: BTreeMap<String, EndpointConfig>,
}

impl EndpointTable {
    /// Build a table. Fails on an empty list, an unnamed entry, a base URI
    /// that is not an absolute http(s) URL, or a duplicate name.
    pub fn new(entries: impl IntoIterator<Item = EndpointConfig>) -> ConnectorResult<Self> {
        let mut table = BTreeMap::new();

        for entry in entries {
            if entry.name.trim().is_empty() {
                return Err(ConnectorError::Configuration(
                    "Endpoint is not defined correctly, the config key (name) is empty".into(),
                ));
            }
            check_base_uri(&entry)?;
            if table.contains_key(&entry.name) {
                return Err(ConnectorError::Configuration(format!(
                    "Endpoint ({}) is defined more than once",
                    entry.name
                )));
            }
            table.insert(entry.name.clone(), entry);
        }

        if table.is_empty() {
            return Err(ConnectorError::Configuration(
                "Endpoints variable is empty.".into(),
            ));
        }

        Ok(Self { entries: table })
    }

    /// Build a table from loosely typed JSON: either an array of entries or an
    /// object keyed by endpoint name. Every entry must define all
    /// `REQUIRED_KEYS`.
    pub fn from_json(value: &Value) -> ConnectorResult<Self> {
        let raw: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => {
                return Err(ConnectorError::Configuration(
                    "Endpoints must be a list or a mapping of endpoint entries".into(),
                ))
            }
        };

        let mut entries = Vec::with_capacity(raw.len());
        for (index, item) in raw.into_iter().enumerate() {
            let label = item
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);

            let Some(object) = item.as_object() else {
                return Err(ConnectorError::Configuration(format!(
                    "Endpoint ({label}) is not a mapping"
                )));
            };
            if let Some(key) = missing_key(|key| object.get(key).is_some_and(|v| !v.is_null())) {
                return Err(missing_key_error(&label, key));
            }

            let entry = serde_json::from_value::<EndpointConfig>(item.clone()).map_err(|e| {
                ConnectorError::Configuration(format!("Endpoint ({label}) is invalid: {e}"))
            })?;
            entries.push(entry);
        }

        Self::new(entries)
    }

    pub fn get(&self, name: &str) -> Option<&EndpointConfig> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointConfig> {
        self.entries.values()
    }
}

/// First required key for which `present` returns false.
pub fn missing_key(present: impl Fn(&str) -> bool) -> Option<&'static str> {
    REQUIRED_KEYS.into_iter().find(|key| !present(*key))
}

pub fn missing_key_error(label: &str, key: &str) -> ConnectorError {
    ConnectorError::Configuration(format!(
        "Endpoint ({label}) is not defined correctly, the config key ({key}) is not defined"
    ))
}

fn check_base_uri(entry: &EndpointConfig) -> ConnectorResult<()> {
    let invalid = |reason: String| {
        ConnectorError::Configuration(format!(
            "Endpoint ({}) has an invalid base URI `{}`: {reason}",
            entry.name, entry.endpoint
        ))
    };

    let url = Url::parse(&entry.endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint(name: &str, base: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            endpoint: base.into(),
            auth: false,
            auth_type: "none".into(),
            auth_user: String::new(),
            auth_pass: String::new(),
            proxy: true,
        }
    }

    #[test]
    fn test_table_lookup() {
        let table = EndpointTable::new([
            endpoint("users", "http://users.internal"),
            endpoint("billing", "https://billing.internal:8443"),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("users").unwrap().endpoint, "http://users.internal");
        assert!(table.get("orders").is_none());
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["billing", "users"]);
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = EndpointTable::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(_)));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        assert!(EndpointTable::new([endpoint("", "http://a")]).is_err());
        assert!(EndpointTable::new([endpoint("a", "not a url")]).is_err());
        assert!(EndpointTable::new([endpoint("a", "ftp://files.internal")]).is_err());
        assert!(EndpointTable::new([
            endpoint("a", "http://a.internal"),
            endpoint("a", "http://b.internal"),
        ])
        .is_err());
    }

    #[test]
    fn test_from_json_requires_every_key() {
        let value = json!([{
            "name": "users",
            "endpoint": "http://users.internal",
            "auth": false,
            "auth_type": "none",
            "auth_user": "",
            "proxy": true
        }]);

        let err = EndpointTable::from_json(&value).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Endpoint (users) is not defined correctly, the config key (auth_pass) is not defined"
        );
    }

    #[test]
    fn test_from_json_accepts_mapping() {
        let value = json!({
            "users": {
                "name": "users",
                "endpoint": "http://users.internal",
                "auth": true,
                "auth_type": "basic",
                "auth_user": "svc",
                "auth_pass": "secret",
                "proxy": true
            }
        });

        let table = EndpointTable::from_json(&value).unwrap();
        assert_eq!(table.get("users").unwrap().auth_type, "basic");
    }

    #[test]
    fn test_secrets_are_redacted() {
        let mut entry = endpoint("users", "http://users.internal");
        entry.auth_pass = "hunter2".into();

        assert!(!format!("{entry:?}").contains("hunter2"));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("auth_pass").is_none());
    }
}
