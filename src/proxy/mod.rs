//! Reverse-proxy forwarding over an `Executor`.
//!
//! # Data Flow
//! ```text
//! InboundRequest + endpoint name
//!     → endpoints.rs (resolve base URI)
//!     → record proxy metadata on the inbound request
//!     → build outbound headers (drop host and hop-by-hop, correlation ids)
//!     → Executor::execute
//!     → ResponseEnvelope::get_response(representation)
//! ```
//!
//! # Design Decisions
//! - The forwarder owns no connection state; it composes over any `Executor`
//! - The endpoint table is swapped atomically so a config reload never blocks
//!   in-flight calls
//! - Endpoint resolution happens before anything is sent

pub mod endpoints;
pub mod inbound;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::connector::request::{HeaderValue, Headers, RequestSpec};
use crate::connector::{Connector, Executor, Rendered, Representation};
use crate::error::{ConnectorError, ConnectorResult};

pub use endpoints::{EndpointConfig, EndpointTable};
pub use inbound::{CapturedRequest, InboundRequest};

/// Correlation header carrying the caller's request id.
pub const REQUEST_ID_HEADER: &str = "bizhost-request-identifier";

/// Correlation header carrying the caller's session id.
pub const SESSION_ID_HEADER: &str = "bizhost-session-identifier";

/// Attribute set on the inbound request describing the forward.
pub const PROXY_ATTRIBUTE: &str = "proxy";

/// Headers that describe the inbound connection, never the outbound one.
/// `accept-encoding` goes too: the transport hands bodies back undecoded.
const STRIPPED_HEADERS: [&str; 5] = [
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "accept-encoding",
];

/// Forwards inbound requests to named upstream endpoints.
pub struct ProxyForwarder<E = Connector> {
    executor: E,
    endpoints: ArcSwapOption<EndpointTable>,
}

impl<E: Executor> ProxyForwarder<E> {
    /// A forwarder with no endpoint table yet.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            endpoints: ArcSwapOption::empty(),
        }
    }

    pub fn with_endpoints(executor: E, table: EndpointTable) -> Self {
        let forwarder = Self::new(executor);
        forwarder.replace_endpoints(table);
        forwarder
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Validate and install a new endpoint table.
    ///
    /// On error the previous table stays in place.
    pub fn set_endpoints(
        &self,
        entries: impl IntoIterator<Item = EndpointConfig>,
    ) -> ConnectorResult<()> {
        let table = EndpointTable::new(entries)?;
        self.replace_endpoints(table);
        Ok(())
    }

    pub fn replace_endpoints(&self, table: EndpointTable) {
        tracing::info!(endpoints = table.len(), "Endpoint table installed");
        self.endpoints.store(Some(Arc::new(table)));
    }

    pub fn endpoints(&self) -> Option<Arc<EndpointTable>> {
        self.endpoints.load_full()
    }

    /// Whether `name` is in the current endpoint table.
    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints
            .load_full()
            .is_some_and(|table| table.get(name).is_some())
    }

    /// Look up an endpoint by name.
    pub fn resolve_endpoint(&self, name: &str) -> ConnectorResult<EndpointConfig> {
        let table = self.endpoints.load_full().ok_or_else(|| {
            ConnectorError::Configuration(
                "There are no endpoint configurations set, please define the endpoints first"
                    .into(),
            )
        })?;

        table
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(name.to_string()))
    }

    /// Relay the inbound request's method, fields and headers to `endpoint`.
    pub async fn redirect<R>(
        &self,
        inbound: &mut R,
        endpoint: &str,
        path: &str,
        representation: Representation,
    ) -> ConnectorResult<Option<Rendered>>
    where
        R: InboundRequest + ?Sized,
    {
        let config = self.resolve_endpoint(endpoint)?;
        record_proxy(inbound, &config, path, representation);

        let mut headers = outbound_headers(inbound.headers().clone());
        inject_correlation(&mut headers, inbound);

        let request = RequestSpec::new(inbound.method().clone(), path)
            .with_data(inbound.fields().clone())
            .with_headers(headers)
            .with_base_uri(config.endpoint.as_str());

        self.forward(endpoint, request, representation).await
    }

    /// Send a caller-built request to `endpoint` on behalf of `inbound`.
    ///
    /// Caller headers override inbound headers. A `json` representation forces
    /// `content-type: application/json`.
    #[allow(clippy::too_many_arguments)]
    pub async fn call<R>(
        &self,
        inbound: &mut R,
        method: Method,
        endpoint: &str,
        path: &str,
        data: Map<String, Value>,
        headers: Headers,
        representation: Representation,
    ) -> ConnectorResult<Option<Rendered>>
    where
        R: InboundRequest + ?Sized,
    {
        let config = self.resolve_endpoint(endpoint)?;
        record_proxy(inbound, &config, path, representation);

        let mut merged = inbound.headers().clone();
        for (name, value) in headers {
            merged.insert(name.to_ascii_lowercase(), value);
        }
        let mut merged = outbound_headers(merged);
        if representation == Representation::Json {
            merged.insert("content-type".into(), HeaderValue::from("application/json"));
        }
        inject_correlation(&mut merged, inbound);

        let request = RequestSpec::new(method, path)
            .with_data(data)
            .with_headers(merged)
            .with_base_uri(config.endpoint.as_str());

        self.forward(endpoint, request, representation).await
    }

    async fn forward(
        &self,
        endpoint: &str,
        request: RequestSpec,
        representation: Representation,
    ) -> ConnectorResult<Option<Rendered>> {
        tracing::debug!(
            endpoint = %endpoint,
            method = %request.method,
            path = %request.url,
            response_type = %representation,
            "Forwarding request"
        );

        let mut envelope = self.executor.execute(request).await?;
        tracing::debug!(
            endpoint = %endpoint,
            status = envelope.status(),
            cache_hit = envelope.cache_hit(),
            "Upstream responded"
        );
        envelope.get_response(representation)
    }
}

impl<E: Executor> std::fmt::Debug for ProxyForwarder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyForwarder")
            .field(
                "endpoints",
                &self.endpoints().map(|table| table.names().map(str::to_string).collect::<Vec<_>>()),
            )
            .finish()
    }
}

fn record_proxy<R>(inbound: &mut R, config: &EndpointConfig, path: &str, representation: Representation)
where
    R: InboundRequest + ?Sized,
{
    inbound.set_attribute(
        PROXY_ATTRIBUTE,
        json!({
            "host": config.endpoint,
            "path": path,
            "response_type": representation.as_str(),
        }),
    );
}

fn outbound_headers(mut headers: Headers) -> Headers {
    headers.retain(|name, _| {
        !STRIPPED_HEADERS
            .iter()
            .any(|stripped| name.eq_ignore_ascii_case(stripped))
    });
    headers
}

/// Copy the correlation ids from the inbound fields (or headers) onto the
/// outbound headers. Absent ids are not sent.
fn inject_correlation<R>(headers: &mut Headers, inbound: &R)
where
    R: InboundRequest + ?Sized,
{
    for name in [REQUEST_ID_HEADER, SESSION_ID_HEADER] {
        headers.remove(name);
        if let Some(value) = correlation_value(inbound, name) {
            headers.insert(name.to_string(), HeaderValue::Single(value));
        }
    }
}

fn correlation_value<R>(inbound: &R, name: &str) -> Option<String>
where
    R: InboundRequest + ?Sized,
{
    match inbound.field(name) {
        Some(Value::String(value)) => return Some(value.clone()),
        Some(Value::Null) | None => {}
        Some(other) => return Some(other.to_string()),
    }

    inbound
        .headers()
        .get(name)
        .and_then(|value| value.values().first().map(|v| v.to_string()))
}
