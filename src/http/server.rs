//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy and admin handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Enforce the inbound body limit
//! - Dispatch requests to the proxy forwarder
//! - Graceful shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::schema::GatewayConfig;
use crate::connector::Representation;
use crate::http::request::{capture_request, request_id, select_representation, UuidRequestId};
use crate::http::response::{error_response, render, ErrorBody};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::proxy::ProxyForwarder;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<ProxyForwarder>,
    pub default_representation: Representation,
    pub max_body_bytes: usize,
    /// Bearer key for `/admin`; `None` when the admin API is disabled.
    pub admin_key: Option<Arc<str>>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server around an already built forwarder.
    pub fn new(config: GatewayConfig, forwarder: Arc<ProxyForwarder>) -> Self {
        let default_representation = config
            .connector
            .default_response_type
            .parse()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to the json response type");
                Representation::default()
            });

        let state = AppState {
            forwarder,
            default_representation,
            max_body_bytes: config.listener.max_body_bytes,
            admin_key: config
                .admin
                .enabled
                .then(|| Arc::from(config.admin.api_key.as_str())),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{endpoint}", any(proxy_handler))
            .route("/{endpoint}/{*path}", any(proxy_handler));

        if state.admin_key.is_some() {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .with_state(state)
            .layer(TimeoutLayer::new(config.listener.request_timeout()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.config.endpoints.len(),
            admin = self.config.admin.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Forward `/{endpoint}/{*path}` to the named upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers);

    let endpoint = params.get("endpoint").cloned().unwrap_or_default();
    let mut target = format!("/{}", params.get("path").map(String::as_str).unwrap_or_default());
    if let Some(query) = parts.uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected inbound body");
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody::new(format!("Request body exceeds {} bytes", state.max_body_bytes)),
            );
        }
    };

    let representation = select_representation(&parts.headers, state.default_representation);
    let mut inbound = match capture_request(&parts, &target, &body) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected inbound request");
            return error_response(StatusCode::BAD_REQUEST, ErrorBody::new(e.to_string()));
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        endpoint = %endpoint,
        path = %target,
        response_type = %representation,
        "Proxying request"
    );

    let outcome = state
        .forwarder
        .redirect(&mut inbound, &endpoint, &target, representation)
        .await;
    let response = render(outcome, representation);

    metrics::record_gateway_response(
        endpoint_label(&state.forwarder, &endpoint),
        response.status().as_u16(),
    );
    tracing::info!(
        request_id = %request_id,
        method = %parts.method,
        endpoint = %endpoint,
        path = %target,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

/// Metric label for an endpoint segment. Names outside the table share one
/// label so clients cannot mint new series.
fn endpoint_label<'a>(forwarder: &ProxyForwarder, endpoint: &'a str) -> &'a str {
    if forwarder.has_endpoint(endpoint) {
        endpoint
    } else {
        UNKNOWN_ENDPOINT
    }
}

const UNKNOWN_ENDPOINT: &str = "unknown";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;
    use crate::proxy::EndpointConfig;

    #[test]
    fn test_unknown_endpoints_share_a_label() {
        let forwarder = ProxyForwarder::new(Connector::default());
        assert_eq!(endpoint_label(&forwarder, "users"), "unknown");

        forwarder
            .set_endpoints([EndpointConfig {
                name: "users".into(),
                endpoint: "http://users.internal".into(),
                auth: false,
                auth_type: "none".into(),
                auth_user: String::new(),
                auth_pass: String::new(),
                proxy: true,
            }])
            .unwrap();
        assert_eq!(endpoint_label(&forwarder, "users"), "users");
        assert_eq!(endpoint_label(&forwarder, "x7f3-random"), "unknown");
    }
}
