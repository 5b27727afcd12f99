//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Capture the inbound request as a `CapturedRequest`
//! - Pick the representation the client asked for
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body fields override query fields with the same name
//! - Bodies other than JSON objects and urlencoded forms are not forwarded

use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Request};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::connector::Representation;
use crate::proxy::CapturedRequest;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header selecting the response representation. Never forwarded upstream.
pub const X_RESPONSE_TYPE: &str = "x-response-type";

/// Gateway-local headers that never reach the forwarder. The request ID is
/// unique per call and would otherwise end up in the cache fingerprint.
const LOCAL_HEADERS: [&str; 2] = [X_RESPONSE_TYPE, X_REQUEST_ID];

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, `unknown` if none was assigned.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Errors turning an inbound request into a `CapturedRequest`.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON request body must be an object")]
    NotAnObject,
}

/// Snapshot an inbound request for forwarding.
///
/// `path` is the outbound path (already stripped of the endpoint segment).
pub fn capture_request(
    parts: &Parts,
    path: &str,
    body: &Bytes,
) -> Result<CapturedRequest, CaptureError> {
    let mut captured = CapturedRequest::new(parts.method.clone(), path);

    for (name, value) in &parts.headers {
        if LOCAL_HEADERS.contains(&name.as_str()) {
            continue;
        }
        match value.to_str() {
            Ok(value) => captured.add_header(name.as_str(), value.to_string()),
            Err(_) => tracing::debug!(header = %name, "Skipping non-text header"),
        }
    }

    let mut fields = Map::new();
    if let Some(query) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            fields.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }
    fields.extend(body_fields(&parts.headers, body)?);

    Ok(captured.with_fields(fields))
}

fn body_fields(headers: &HeaderMap, body: &Bytes) -> Result<Map<String, Value>, CaptureError> {
    if body.is_empty() {
        return Ok(Map::new());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        match serde_json::from_slice::<Value>(body)? {
            Value::Object(map) => Ok(map),
            _ => Err(CaptureError::NotAnObject),
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Ok(url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect())
    } else {
        tracing::debug!(content_type = %content_type, bytes = body.len(), "Ignoring unsupported request body");
        Ok(Map::new())
    }
}

/// Representation requested via `x-response-type`, else `default`.
///
/// An unknown value is logged and replaced by `default`.
pub fn select_representation(headers: &HeaderMap, default: Representation) -> Representation {
    let Some(requested) = headers
        .get(X_RESPONSE_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return default;
    };

    requested.parse().unwrap_or_else(|e| {
        tracing::warn!(requested = %requested, error = %e, fallback = %default, "Unknown response type");
        default
    })
}
