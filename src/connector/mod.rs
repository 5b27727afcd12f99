//! Outbound request execution.
//!
//! # Data Flow
//! ```text
//! RequestSpec
//!     → request.rs (sanitize headers)
//!     → strip base URI, resolve absolute target
//!     → cache (fingerprint, try_get: hit returns without dispatch)
//!     → body.rs (JSON or form body)
//!     → transport.rs (one upstream exchange)
//!     → policy.rs (success / tolerated / fatal)
//!     → cache (best-effort put)
//!     → envelope.rs (ResponseEnvelope returned by value)
//! ```
//!
//! # Design Decisions
//! - Nothing call-scoped lives on the connector, so one instance can be
//!   shared across tasks behind an `Arc`
//! - The `Executor` trait is the seam the proxy forwarder composes over
//! - No retries: a fatal outcome is reported immediately

pub mod body;
pub mod envelope;
pub mod policy;
pub mod request;
pub mod transport;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;

use crate::cache::{CacheGateway, CacheKey, CacheStore};
use crate::error::{ConnectorError, ConnectorResult};
use crate::observability::metrics;

use body::OutboundBody;
use envelope::{RawResponse, ResponseEnvelope};
use policy::StatusPolicy;
use request::{sanitize_headers, RequestSpec};
use transport::{OutboundRequest, ReqwestTransport, Transport, TransportError};

pub use envelope::{Rendered, Representation};

/// Transport timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Cache TTL applied when none is configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Capability to execute one request and hand back its envelope.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: RequestSpec) -> ConnectorResult<ResponseEnvelope>;
}

/// How a dispatched request was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Tolerated,
    Fatal,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Tolerated => "tolerated",
            Outcome::Fatal => "fatal",
        }
    }
}

/// A transport result sorted by the allow-list.
struct Classified {
    outcome: Outcome,
    status: Option<u16>,
    /// The upstream response, or a synthesized empty one for a tolerated
    /// status that arrived without a body.
    response: Option<RawResponse>,
    /// Transport message for failures with no status.
    detail: Option<String>,
}

/// Executes requests against an upstream with status validation and caching.
#[derive(Clone)]
pub struct Connector {
    base_uri: Option<String>,
    policy: StatusPolicy,
    cache: CacheGateway,
    cache_ttl: Duration,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    proxy: bool,
}

impl Connector {
    /// A plain connector: default allow-list, no cache.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            base_uri: None,
            policy: StatusPolicy::default(),
            cache: CacheGateway::disabled(),
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            transport,
            proxy: false,
        }
    }

    /// A connector for proxying: pass-through allow-list, `proxy` flag set.
    pub fn for_proxy(transport: Arc<dyn Transport>) -> Self {
        Self {
            policy: StatusPolicy::proxy(),
            proxy: true,
            ..Self::new(transport)
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.set_base_uri(base_uri);
        self
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: CacheGateway) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.set_cache_store(store);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the allow-list. Fails when `codes` is empty.
    pub fn set_valid_status_codes(
        &mut self,
        codes: impl IntoIterator<Item = u16>,
    ) -> ConnectorResult<()> {
        self.policy.set_allow_list(codes)
    }

    pub fn set_base_uri(&mut self, base_uri: impl Into<String>) {
        self.base_uri = Some(base_uri.into());
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_cache_ttl(&mut self, ttl: Duration) {
        self.cache_ttl = ttl;
    }

    /// Install a cache store. Counters start from zero.
    pub fn set_cache_store(&mut self, store: Arc<dyn CacheStore>) {
        self.cache = CacheGateway::new(store);
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// Execute one request.
    ///
    /// A cache hit is returned as a success without contacting the upstream,
    /// whatever status it carries. Otherwise statuses outside
    /// the allow-list, and transport failures with no response, fail with
    /// `HttpExecution`.
    pub async fn execute(&self, request: RequestSpec) -> ConnectorResult<ResponseEnvelope> {
        let RequestSpec {
            method,
            url,
            data,
            headers,
            base_uri,
        } = request;

        let headers = sanitize_headers(headers);
        let base_uri = base_uri.or_else(|| self.base_uri.clone());
        let target = resolve_target(base_uri.as_deref(), &url)?;
        let key = self.cache.fingerprint(&method, &target, &data, &headers);

        if let Some(cached) = self.cache.try_get(&key) {
            tracing::debug!(method = %method, url = %target, cache_key = %key, "Serving response from cache");
            metrics::record_execution("cache_hit");
            return Ok(ResponseEnvelope::from_cache(cached));
        }

        let body = OutboundBody::select(&method, &headers, &data);
        let outbound = OutboundRequest {
            method: method.clone(),
            url: target.clone(),
            headers,
            body,
            timeout: self.timeout,
        };

        tracing::debug!(method = %method, url = %target, "Dispatching upstream request");
        let start = Instant::now();
        let result = self.transport.send(outbound).await;

        let Classified {
            outcome,
            status,
            response,
            detail,
        } = self.classify(result);
        metrics::record_upstream_duration(method.as_str(), status, start);
        metrics::record_execution(outcome.as_str());

        if let Some(response) = &response {
            self.store(&key, response);
        }

        match outcome {
            Outcome::Success => Ok(ResponseEnvelope::from_upstream(response_or_empty(response, status))),
            Outcome::Tolerated => {
                tracing::info!(
                    method = %method,
                    url = %target,
                    status = ?status,
                    "Upstream error status tolerated by allow-list"
                );
                Ok(ResponseEnvelope::from_upstream(response_or_empty(response, status)))
            }
            Outcome::Fatal => {
                let envelope = response.map(ResponseEnvelope::from_upstream);
                Err(self.fatal(&method, &target, status, detail, envelope))
            }
        }
    }

    fn classify(&self, result: Result<RawResponse, TransportError>) -> Classified {
        match result {
            Ok(raw) => Classified {
                outcome: if self.policy.is_acceptable(raw.status) {
                    Outcome::Success
                } else {
                    Outcome::Fatal
                },
                status: Some(raw.status),
                response: Some(raw),
                detail: None,
            },
            Err(err) => {
                let tolerated = err.status.is_some_and(|code| self.policy.is_acceptable(code));
                if tolerated {
                    let response = err
                        .response
                        .or_else(|| err.status.map(|code| RawResponse::new(code, "")));
                    Classified {
                        outcome: Outcome::Tolerated,
                        status: err.status,
                        response,
                        detail: None,
                    }
                } else {
                    Classified {
                        outcome: Outcome::Fatal,
                        status: err.status,
                        response: err.response,
                        detail: Some(err.message),
                    }
                }
            }
        }
    }

    fn store(&self, key: &CacheKey, response: &RawResponse) {
        self.cache.put(key, response, self.cache_ttl);
    }

    fn fatal(
        &self,
        method: &Method,
        target: &str,
        status: Option<u16>,
        detail: Option<String>,
        envelope: Option<ResponseEnvelope>,
    ) -> ConnectorError {
        let allowed = self.policy.describe();
        let message = match (status, detail) {
            (Some(code), _) => format!(
                "HTTP exception, got a {code} status, expect only one of these ({allowed})"
            ),
            (None, Some(detail)) => format!(
                "HTTP exception, {detail}, expect only one of these ({allowed})"
            ),
            (None, None) => format!(
                "HTTP exception, no response received, expect only one of these ({allowed})"
            ),
        };

        tracing::error!(method = %method, url = %target, status = ?status, "{message}");

        ConnectorError::HttpExecution {
            status,
            message,
            response: envelope.map(Box::new),
        }
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("base_uri", &self.base_uri)
            .field("policy", &self.policy.describe())
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[async_trait]
impl Executor for Connector {
    async fn execute(&self, request: RequestSpec) -> ConnectorResult<ResponseEnvelope> {
        Connector::execute(self, request).await
    }
}

fn response_or_empty(response: Option<RawResponse>, status: Option<u16>) -> RawResponse {
    response.unwrap_or_else(|| RawResponse::new(status.unwrap_or_default(), ""))
}

/// Build the absolute target URL.
///
/// Every literal occurrence of the base URI is removed from `url` first, so
/// callers may pass either a relative path or a fully qualified URL.
fn resolve_target(base_uri: Option<&str>, url: &str) -> ConnectorResult<String> {
    let stripped = match base_uri {
        Some(base) if !base.is_empty() => url.replace(base, ""),
        _ => url.to_string(),
    };

    if stripped.starts_with("http://") || stripped.starts_with("https://") {
        return Ok(stripped);
    }

    let base = base_uri.filter(|base| !base.is_empty()).ok_or_else(|| {
        ConnectorError::Configuration(format!(
            "No base URI configured for relative url `{url}`"
        ))
    })?;

    let base = base.trim_end_matches('/');
    if stripped.is_empty() {
        Ok(base.to_string())
    } else if stripped.starts_with('/') {
        Ok(format!("{base}{stripped}"))
    } else {
        Ok(format!("{base}/{stripped}"))
    }
}
