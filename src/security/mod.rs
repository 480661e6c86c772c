//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on /payments/*:
//!     → rate_limit.rs (extract API key, per-key fixed window)
//!         missing key  → 401
//!         over limit   → 429 + Retry-After
//!     → Pass to payment handler
//!
//! Background:
//!     sweeper.rs → evict windows idle for several window lengths
//! ```
//!
//! # Design Decisions
//! - Fail closed: no identity, no admission
//! - Denied requests still count against the window
//! - Per-key locking only; identities never contend with each other

pub mod rate_limit;
pub mod sweeper;

pub use rate_limit::{admission_middleware, AdmissionGate, AdmissionState, Decision, DenyReason, RateWindow, WindowStore};
pub use sweeper::WindowSweeper;
