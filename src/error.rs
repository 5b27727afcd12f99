//! Error types for the connector and the proxy forwarder.
//!
//! # Design Decisions
//! - Only `Configuration`, `NotFound` and `HttpExecution` ever terminate a call;
//!   tolerated upstream errors are successful executions
//! - `HttpExecution` keeps the upstream envelope (when there was one) so the
//!   caller can inspect status and body after the failure
//! - JSON decoding and cache-store failures are swallowed where they happen and
//!   never appear here

use thiserror::Error;

use crate::connector::envelope::ResponseEnvelope;

/// Errors surfaced by `Connector`, `ProxyForwarder` and `ResponseEnvelope`.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Misconfiguration: empty allow-list, empty or malformed endpoint table,
    /// endpoint table never populated.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint name is not present in the endpoint table.
    #[error("Endpoint `{0}` is not defined in the endpoint table")]
    NotFound(String),

    /// The upstream returned a status outside the allow-list, or the transport
    /// failed without any recoverable response.
    #[error("{message}")]
    HttpExecution {
        status: Option<u16>,
        message: String,
        response: Option<Box<ResponseEnvelope>>,
    },

    /// The envelope body was already read once.
    #[error("Response body was already consumed")]
    AlreadyConsumed,
}

impl ConnectorError {
    /// Upstream status code carried by an `HttpExecution` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::HttpExecution { status, .. } => *status,
            _ => None,
        }
    }

    /// Take the upstream envelope out of an `HttpExecution` error.
    pub fn into_response(self) -> Option<ResponseEnvelope> {
        match self {
            ConnectorError::HttpExecution { response, .. } => response.map(|r| *r),
            _ => None,
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
