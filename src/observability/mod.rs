//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, dispatcher, transport and auth bridge produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout/stderr (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Correlation ids travel as a structured `id` field on every request-scoped event
//! - Metric updates are fire-and-forget; without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;
