//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (subscriber setup: env-filter, text or JSON)
//!     → access.rs (one record per request, emitted when the body ends)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through spans, access records and upstream headers
//! - Metrics are cheap (atomic increments, no-op without a recorder)

pub mod access;
pub mod logging;
pub mod metrics;
