//! Request fingerprinting.
//!
//! The key is a SHA-512 digest over the method, the target URL and SHA-256
//! digests of the canonical payload and header serializations. Object keys are
//! sorted recursively before hashing, so two mappings holding the same pairs
//! in a different insertion order produce the same key.

use std::fmt;

use reqwest::Method;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha512};

use crate::connector::request::{HeaderValue, Headers};

/// Deterministic cache key for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a request.
    pub fn fingerprint(
        method: &Method,
        url: &str,
        data: &Map<String, Value>,
        headers: &Headers,
    ) -> Self {
        let mut data_json = String::new();
        write_canonical_object(data.iter(), &mut data_json);

        let header_values: Map<String, Value> = headers
            .iter()
            .map(|(name, value)| (name.clone(), header_to_json(value)))
            .collect();
        let mut headers_json = String::new();
        write_canonical_object(header_values.iter(), &mut headers_json);

        let mut hasher = Sha512::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(sha256_hex(&data_json).as_bytes());
        hasher.update(sha256_hex(&headers_json).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn header_to_json(value: &HeaderValue) -> Value {
    match value {
        HeaderValue::Single(value) => Value::String(value.clone()),
        HeaderValue::Multi(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
    }
}

/// Serialize a JSON value with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map.iter(), out),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>, out: &mut String) {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (index, (key, value)) in entries.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}
