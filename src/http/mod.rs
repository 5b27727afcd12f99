//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, `/{endpoint}/{*path}` route)
//!     → request.rs (request ID, capture inbound request, pick representation)
//!     → proxy::ProxyForwarder::redirect
//!     → response.rs (rendered body or error → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID, X_RESPONSE_TYPE};
pub use server::{AppState, GatewayServer};
