//! Outbound HTTP connector with status allow-listing, response caching and a
//! reverse-proxy forwarder.
//!
//! ```text
//! ProxyForwarder ──▶ Executor (Connector) ──▶ CacheGateway ──▶ CacheStore
//!                                        └──▶ Transport (reqwest)
//! ```

// Core
pub mod cache;
pub mod connector;
pub mod error;
pub mod proxy;

// Gateway binary support
pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use cache::{CacheGateway, CacheStore, MemoryCache};
pub use config::schema::GatewayConfig;
pub use connector::envelope::{RawResponse, ResponseEnvelope};
pub use connector::policy::StatusPolicy;
pub use connector::request::{HeaderValue, Headers, RequestSpec};
pub use connector::transport::{ReqwestTransport, Transport, TransportError};
pub use connector::{Connector, Executor, Rendered, Representation};
pub use error::{ConnectorError, ConnectorResult};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use proxy::{CapturedRequest, EndpointConfig, EndpointTable, InboundRequest, ProxyForwarder};
