//! Inbound request abstraction used by the forwarder.

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{Map, Value};

use crate::connector::request::{HeaderValue, Headers};

/// What the forwarder needs from the request it is relaying.
pub trait InboundRequest: Send + Sync {
    fn method(&self) -> &Method;

    fn path(&self) -> &str;

    /// Lowercase header name -> value(s).
    fn headers(&self) -> &Headers;

    /// Merged query and body fields.
    fn fields(&self) -> &Map<String, Value>;

    fn field(&self, name: &str) -> Option<&Value> {
        self.fields().get(name)
    }

    /// Attach metadata for downstream observers.
    fn set_attribute(&mut self, name: &str, value: Value);

    fn attribute(&self, name: &str) -> Option<&Value>;
}

/// An owned snapshot of an inbound HTTP request.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    method: Method,
    path: String,
    headers: Headers,
    fields: Map<String, Value>,
    attributes: BTreeMap<String, Value>,
}

impl CapturedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            fields: Map::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Append a header value, keeping earlier values for the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.add_header(name, value.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn add_header(&mut self, name: &str, value: String) {
        let name = name.to_ascii_lowercase();
        let merged = match self.headers.remove(&name) {
            None => HeaderValue::Single(value),
            Some(HeaderValue::Single(first)) => HeaderValue::Multi(vec![first, value]),
            Some(HeaderValue::Multi(mut values)) => {
                values.push(value);
                HeaderValue::Multi(values)
            }
        };
        self.headers.insert(name, merged);
    }

    pub fn remove_header(&mut self, name: &str) -> Option<HeaderValue> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

impl InboundRequest for CapturedRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}
