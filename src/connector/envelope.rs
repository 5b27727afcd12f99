//! Upstream response wrapper.
//!
//! # Responsibilities
//! - Hold the upstream status, reason phrase, headers and body
//! - Record whether the response was restored from cache
//! - Render the body in the representation the caller asks for
//!
//! # Design Decisions
//! - `RawResponse` is plain owned data: what the transport produces and what
//!   the cache stores
//! - `ResponseEnvelope` is returned by value from each execution; the body can
//!   be taken once, a second read fails with `AlreadyConsumed`
//! - JSON decode failures yield `None` rather than an error

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, ConnectorResult};

/// A complete upstream response as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    /// Lowercase header name -> values.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Append a header value.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }
}

/// Representation requested from `ResponseEnvelope::get_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Original,
    #[default]
    Json,
    Xml,
    Html,
    Text,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Original => "original",
            Representation::Json => "json",
            Representation::Xml => "xml",
            Representation::Html => "html",
            Representation::Text => "text",
        }
    }

    /// Content type used when this representation is served back to a client.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Representation::Original => None,
            Representation::Json => Some("application/json"),
            Representation::Xml => Some("application/xml; charset=utf-8"),
            Representation::Html => Some("text/html; charset=utf-8"),
            Representation::Text => Some("text/plain; charset=utf-8"),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Representation {
    type Err = ConnectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(Representation::Original),
            "json" => Ok(Representation::Json),
            "xml" => Ok(Representation::Xml),
            "html" => Ok(Representation::Html),
            "text" => Ok(Representation::Text),
            other => Err(ConnectorError::Configuration(format!(
                "unknown response type `{other}`"
            ))),
        }
    }
}

/// A rendered response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// The raw upstream response.
    Original(RawResponse),
    /// Decoded JSON document.
    Json(Value),
    /// XML, HTML or plain text body.
    Text(String),
}

/// Upstream response returned by one execution.
#[derive(Debug)]
pub struct ResponseEnvelope {
    status: u16,
    reason: String,
    headers: BTreeMap<String, Vec<String>>,
    body: Option<Bytes>,
    cache_hit: bool,
}

impl ResponseEnvelope {
    /// Wrap a response that came from the transport.
    pub fn from_upstream(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            reason: raw.reason,
            headers: raw.headers,
            body: Some(raw.body),
            cache_hit: false,
        }
    }

    /// Wrap a response restored from cache.
    pub fn from_cache(raw: RawResponse) -> Self {
        Self {
            cache_hit: true,
            ..Self::from_upstream(raw)
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Values for a header (case-insensitive), empty if absent.
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Header values joined with `, `.
    pub fn header_line(&self, name: &str) -> String {
        self.header(name).join(", ")
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// True once the body has been taken.
    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// Take the body. The second call fails with `AlreadyConsumed`.
    pub fn take_body(&mut self) -> ConnectorResult<Bytes> {
        self.body.take().ok_or(ConnectorError::AlreadyConsumed)
    }

    /// Render the body in the requested representation.
    ///
    /// Returns `Ok(None)` when the body is empty or cannot be decoded.
    pub fn get_response(
        &mut self,
        representation: Representation,
    ) -> ConnectorResult<Option<Rendered>> {
        let body = self.take_body()?;
        if body.is_empty() {
            return Ok(None);
        }

        let rendered = match representation {
            Representation::Json => match serde_json::from_slice::<Value>(&body) {
                Ok(value) => Some(Rendered::Json(value)),
                Err(e) => {
                    tracing::debug!(status = self.status, error = %e, "Upstream body is not valid JSON");
                    None
                }
            },
            Representation::Xml | Representation::Html | Representation::Text => {
                String::from_utf8(body.to_vec()).ok().map(Rendered::Text)
            }
            Representation::Original => Some(Rendered::Original(RawResponse {
                status: self.status,
                reason: self.reason.clone(),
                headers: self.headers.clone(),
                body,
            })),
        };
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_representation() {
        let mut envelope = ResponseEnvelope::from_upstream(RawResponse::new(200, r#"{"id":1}"#));
        let rendered = envelope.get_response(Representation::Json).unwrap();
        assert_eq!(rendered, Some(Rendered::Json(json!({"id": 1}))));
    }

    #[test]
    fn test_invalid_json_is_absent() {
        let mut envelope = ResponseEnvelope::from_upstream(RawResponse::new(200, "not json"));
        assert_eq!(envelope.get_response(Representation::Json).unwrap(), None);
    }

    #[test]
    fn test_empty_body_is_absent() {
        let mut envelope = ResponseEnvelope::from_upstream(RawResponse::new(204, ""));
        assert_eq!(envelope.get_response(Representation::Text).unwrap(), None);
    }

    #[test]
    fn test_second_read_fails() {
        let mut envelope = ResponseEnvelope::from_upstream(RawResponse::new(200, "<a/>"));
        let first = envelope.get_response(Representation::Xml).unwrap();
        assert_eq!(first, Some(Rendered::Text("<a/>".into())));
        assert!(envelope.is_consumed());

        let second = envelope.get_response(Representation::Xml);
        assert!(matches!(second, Err(ConnectorError::AlreadyConsumed)));
    }

    #[test]
    fn test_original_representation() {
        let raw = RawResponse::new(201, "created").with_header("Location", "/users/1");
        let mut envelope = ResponseEnvelope::from_upstream(raw.clone());
        let rendered = envelope.get_response(Representation::Original).unwrap();
        assert_eq!(rendered, Some(Rendered::Original(raw)));
    }

    #[test]
    fn test_header_helpers() {
        let raw = RawResponse::new(200, "")
            .with_header("Set-Cookie", "a=1")
            .with_header("set-cookie", "b=2");
        let envelope = ResponseEnvelope::from_cache(raw);

        assert!(envelope.cache_hit());
        assert!(envelope.has_header("SET-COOKIE"));
        assert_eq!(envelope.header("set-cookie").len(), 2);
        assert_eq!(envelope.header_line("Set-Cookie"), "a=1, b=2");
        assert!(envelope.header("x-missing").is_empty());
        assert_eq!(envelope.reason_phrase(), "OK");
    }

    #[test]
    fn test_representation_parsing() {
        assert_eq!("JSON".parse::<Representation>().unwrap(), Representation::Json);
        assert_eq!(
            "original".parse::<Representation>().unwrap(),
            Representation::Original
        );
        assert!("yaml".parse::<Representation>().is_err());
        assert_eq!(Representation::default(), Representation::Json);
    }
}
