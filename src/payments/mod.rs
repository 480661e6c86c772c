//! Payment module.

pub mod client;
pub mod processor;
pub mod types;

pub use client::{PaymentClient, PAYMENT_PROCESS};
pub use processor::PaymentService;
pub use types::{PaymentRequest, PaymentResponse};
