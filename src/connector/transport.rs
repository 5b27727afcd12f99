//! Upstream transport.
//!
//! # Responsibilities
//! - Define the `Transport` capability the connector dispatches through
//! - Provide the default reqwest-backed implementation
//!
//! # Design Decisions
//! - 4xx/5xx responses are surfaced as `TransportError` carrying the full
//!   response, so the connector can still tolerate them via the allow-list
//! - Network failures carry no status and no response
//! - The per-request timeout travels with the request

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;

use crate::connector::body::OutboundBody;
use crate::connector::envelope::RawResponse;
use crate::connector::request::{HeaderValue, Headers};

/// A fully resolved request ready for the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    pub headers: Headers,
    pub body: OutboundBody,
    pub timeout: Duration,
}

/// Transport-level failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Status code of the failed exchange, if the upstream answered at all.
    pub status: Option<u16>,
    pub message: String,
    /// The upstream response, when one was received.
    pub response: Option<RawResponse>,
}

impl TransportError {
    /// A failure with no response at all (DNS, connect, timeout).
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            response: None,
        }
    }

    /// An error status returned by the upstream.
    pub fn status(response: RawResponse) -> Self {
        let kind = if response.status >= 500 {
            "Server error"
        } else {
            "Client error"
        };
        Self {
            status: Some(response.status),
            message: format!("{kind}: {} {}", response.status, response.reason),
            response: Some(response),
        }
    }
}

/// Capability that performs one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// Default transport backed by `reqwest`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            match value {
                HeaderValue::Single(value) => {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                HeaderValue::Multi(values) => {
                    for value in values {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                }
            }
        }

        builder = match &request.body {
            OutboundBody::Empty => builder,
            OutboundBody::Json(value) => builder.json(value),
            OutboundBody::Form(pairs) => builder.form(pairs),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::network(format!(
                    "Request to {} timed out after {:?}",
                    request.url, request.timeout
                ))
            } else {
                TransportError::network(format!("Request to {} failed: {}", request.url, e))
            }
        })?;

        let status = response.status();
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = response.bytes().await.map_err(|e| {
            TransportError::network(format!("Failed to read body from {}: {}", request.url, e))
        })?;

        let raw = RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        };

        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::status(raw));
        }
        Ok(raw)
    }
}
