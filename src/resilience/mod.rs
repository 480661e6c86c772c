//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a downstream (by logical name, e.g. "mail-send"):
//!     → executor.rs (acquire permit, enforce deadline, classify outcome)
//!     → registry.rs (one breaker per name, created on first use)
//!     → circuit_breaker.rs (sliding-window failure rate, Open / Half-Open)
//!     → rate_limiter.rs (optional outbound permits per refresh period)
//!     → events.rs (transitions and outcomes to logs and metrics)
//!     → On failure: caller-supplied fallback (substitute or give up)
//! ```
//!
//! # Design Decisions
//! - Every downstream call has a deadline
//! - An open circuit refuses locally; the downstream is never contacted
//! - 4xx answers are the caller's problem and never trip a circuit
//! - An outbound limiter refusal is not a failure and never trips a circuit
//! - Observers run outside breaker locks

pub mod circuit_breaker;
pub mod events;
pub mod executor;
pub mod rate_limiter;
pub mod registry;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitSnapshot};
pub use events::{
    CircuitEvent, CircuitObserver, CircuitPhase, FanoutObserver, LoggingObserver, MetricsObserver,
    NoopObserver,
};
pub use executor::ProtectedCallExecutor;
pub use rate_limiter::CallRateLimiter;
pub use registry::CircuitRegistry;
