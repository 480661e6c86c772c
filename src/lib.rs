//! Payment Gateway
//!
//! An HTTP payment front end that sheds abusive clients and protects itself
//! from slow or failing downstream services.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                   PAYMENT GATEWAY                    │
//!                  │                                                      │
//!   Client ────────┼─▶ http ──▶ security ──▶ payments ──▶ resilience ─────┼──▶ payment service
//!                  │    server   admission    processor    executor       │
//!                  │             gate                      + breakers ────┼──▶ mail service
//!                  │                                                      │
//!                  │  Cross-cutting: config · observability · lifecycle  │
//!                  │                 admin API · window sweeper           │
//!                  └──────────────────────────────────────────────────────┘
//! ```
//!
//! The admission gate and the circuit registry are shared, `Send + Sync`
//! components; handlers reach them through [`http::AppState`].

pub mod admin;
pub mod clock;
pub mod config;
pub mod downstream;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mail;
pub mod observability;
pub mod payments;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use error::{CallError, DownstreamError, FallbackExhausted, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
