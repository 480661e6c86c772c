//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached by the HTTP layer and shows up in trace spans
//! - Metrics are cheap (atomic increments) and no-ops without a recorder
//! - Circuit breakers report through an observer, never directly

pub mod logging;
pub mod metrics;
