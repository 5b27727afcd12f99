//! Outbound request description.
//!
//! # Responsibilities
//! - Describe a request as plain data (method, url, payload, headers)
//! - Accept header values either as a scalar or as a list
//! - Sanitize headers before fingerprinting and dispatch
//!
//! # Design Decisions
//! - Headers live in a `BTreeMap` keyed by lowercase name, so iteration order
//!   is stable and the cache fingerprint does not depend on insertion order
//! - Payload is a JSON object; it is encoded as JSON or form parameters later,
//!   depending on `content-type`

use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

/// A header value supplied either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// The scalar value, if this is a single value.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            HeaderValue::Single(value) => Some(value),
            HeaderValue::Multi(_) => None,
        }
    }

    /// All values, in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(value) => vec![value.as_str()],
            HeaderValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn into_values(self) -> Vec<String> {
        match self {
            HeaderValue::Single(value) => vec![value],
            HeaderValue::Multi(values) => values,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Single(value)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::Multi(values)
    }
}

impl From<Vec<&str>> for HeaderValue {
    fn from(values: Vec<&str>) -> Self {
        HeaderValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Header mapping: lowercase name -> value(s).
pub type Headers = BTreeMap<String, HeaderValue>;

/// Collapse single-element lists to scalars and lowercase header names.
///
/// Names that collide once lowercased have their values merged into one
/// list. Multi-element lists pass through unchanged.
pub fn sanitize_headers(headers: Headers) -> Headers {
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        merged
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(value.into_values());
    }

    merged
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                HeaderValue::Single(values.remove(0))
            } else {
                HeaderValue::Multi(values)
            };
            (name, value)
        })
        .collect()
}

/// A request to execute against an upstream.
///
/// `url` is relative to the base URI. When `base_uri` is `None` the
/// connector's own base URI is used.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub data: Map<String, Value>,
    pub headers: Headers,
    pub base_uri: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            data: Map::new(),
            headers: Headers::new(),
            base_uri: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Replace the payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Add a single payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Merge a header mapping; entries in `headers` win on conflict.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    /// Direct this request at a different base URI than the connector's.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_element_list_collapses() {
        let mut headers = Headers::new();
        headers.insert("x".into(), HeaderValue::from(vec!["v"]));
        let sanitized = sanitize_headers(headers);
        assert_eq!(sanitized.get("x"), Some(&HeaderValue::Single("v".into())));
    }

    #[test]
    fn test_multi_element_list_unchanged() {
        let mut headers = Headers::new();
        headers.insert("x".into(), HeaderValue::from(vec!["v1", "v2"]));
        let sanitized = sanitize_headers(headers.clone());
        assert_eq!(sanitized, headers);
    }

    #[test]
    fn test_header_names_lowercased() {
        let mut headers = Headers::new();
        headers.insert("Content-Type".into(), "application/json".into());
        let sanitized = sanitize_headers(headers);
        assert_eq!(
            sanitized.get("content-type").and_then(HeaderValue::as_single),
            Some("application/json")
        );
    }

    #[test]
    fn test_case_colliding_names_merge() {
        let mut headers = Headers::new();
        headers.insert("X-Tag".into(), "a".into());
        headers.insert("x-tag".into(), "b".into());

        let sanitized = sanitize_headers(headers);
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized.get("x-tag"), Some(&HeaderValue::from(vec!["a", "b"])));
    }

    #[test]
    fn test_builder() {
        let spec = RequestSpec::post("/users")
            .with_field("name", "ada")
            .with_header("Accept", "application/json")
            .with_base_uri("http://users.internal");

        assert_eq!(spec.method, Method::POST);
        assert_eq!(spec.data["name"], "ada");
        assert!(spec.headers.contains_key("accept"));
        assert_eq!(spec.base_uri.as_deref(), Some("http://users.internal"));
    }

    #[test]
    fn test_header_value_serializes_untagged() {
        let single = serde_json::to_string(&HeaderValue::from("a")).unwrap();
        let multi = serde_json::to_string(&HeaderValue::from(vec!["a", "b"])).unwrap();
        assert_eq!(single, r#""a""#);
        assert_eq!(multi, r#"["a","b"]"#);
    }
}
