//! Response mapping for the gateway.
//!
//! # Responsibilities
//! - Turn a rendered upstream body into a client response
//! - Map connector errors to HTTP status codes
//!
//! # Design Decisions
//! - Rendered representations are served as 200; only `original` replays the
//!   upstream status and headers
//! - Hop-by-hop headers are never replayed
//! - Upstream failures result in 502 Bad Gateway

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::connector::envelope::RawResponse;
use crate::connector::{Rendered, Representation};
use crate::error::{ConnectorError, ConnectorResult};

const HOP_BY_HOP: [&str; 4] = ["connection", "transfer-encoding", "content-length", "keep-alive"];

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            upstream_status: None,
        }
    }
}

/// Error response with a JSON body.
pub fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// Map a forwarding outcome to a client response.
pub fn render(outcome: ConnectorResult<Option<Rendered>>, representation: Representation) -> Response {
    match outcome {
        Ok(Some(Rendered::Json(value))) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Some(Rendered::Text(text))) => {
            let content_type = representation
                .content_type()
                .unwrap_or("text/plain; charset=utf-8");
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], text).into_response()
        }
        Ok(Some(Rendered::Original(raw))) => replay(raw),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

fn map_error(err: ConnectorError) -> Response {
    let status = match &err {
        ConnectorError::NotFound(_) => StatusCode::NOT_FOUND,
        ConnectorError::HttpExecution { .. } => StatusCode::BAD_GATEWAY,
        ConnectorError::Configuration(_) | ConnectorError::AlreadyConsumed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = ErrorBody {
        error: err.to_string(),
        upstream_status: err.status(),
    };
    error_response(status, body)
}

/// Replay an upstream response as-is, minus hop-by-hop headers.
fn replay(raw: RawResponse) -> Response {
    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(raw.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, values) in raw.headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.append(name.clone(), value);
            }
        }
    }
    response
}
