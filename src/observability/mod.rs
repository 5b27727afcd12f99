//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! connector / cache / proxy / gateway
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (plain or JSON)
//!     → Prometheus scrape endpoint (gateway binary only)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; installing subscribers and exporters is
//!   left to the binary
//! - Without a subscriber or recorder every event is silently dropped

pub mod logging;
pub mod metrics;
