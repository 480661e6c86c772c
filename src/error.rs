//! Error taxonomy for the gateway.
//!
//! Downstream failures never reach business logic raw: the protected call
//! executor converts them into [`CallError`] before returning. Admission
//! rejections are plain values (`Decision::Deny`) and only become a
//! [`GatewayError`] at the HTTP seam.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or on the way to) a downstream service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownstreamError {
    /// The downstream answered with a non-2xx status.
    #[error("downstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No usable answer: connect refused, reset, unreadable body.
    #[error("downstream unreachable: {0}")]
    Transport(String),
}

impl DownstreamError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        DownstreamError::Status {
            status,
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        DownstreamError::Transport(message.into())
    }

    /// HTTP status, `None` for transport failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DownstreamError::Status { status, .. } => Some(*status),
            DownstreamError::Transport(_) => None,
        }
    }

    /// Whether this failure counts against the circuit.
    ///
    /// Server errors and transport failures do; 4xx responses are the
    /// caller's fault and say nothing about downstream health.
    pub fn is_recordable(&self) -> bool {
        match self {
            DownstreamError::Transport(_) => true,
            DownstreamError::Status { status, .. } => !(400..500).contains(status),
        }
    }
}

/// Outcome kinds of a protected call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Circuit open: refused locally, downstream never contacted.
    #[error("call '{name}' not permitted: circuit is open")]
    CallRefused { name: String },

    /// Outbound permits for the current period are used up; downstream never
    /// contacted and the circuit is not touched.
    #[error("call '{name}' not permitted: rate limit exceeded")]
    RequestNotPermitted { name: String },

    /// No answer from the downstream within the deadline.
    #[error("call '{name}' timed out after {}ms", .deadline.as_millis())]
    CallTimeout { name: String, deadline: Duration },

    /// The downstream answered with an error.
    #[error("call '{name}' failed: {source}")]
    Downstream {
        name: String,
        #[source]
        source: DownstreamError,
    },

    /// The fallback decided the request cannot be satisfied.
    #[error("{reason}")]
    FallbackExhausted {
        name: String,
        reason: String,
        #[source]
        cause: Box<CallError>,
    },
}

impl CallError {
    /// Logical call name the error belongs to.
    pub fn call_name(&self) -> &str {
        match self {
            CallError::CallRefused { name }
            | CallError::RequestNotPermitted { name }
            | CallError::CallTimeout { name, .. }
            | CallError::Downstream { name, .. }
            | CallError::FallbackExhausted { name, .. } => name,
        }
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::CallRefused { .. } => "call_refused",
            CallError::RequestNotPermitted { .. } => "request_not_permitted",
            CallError::CallTimeout { .. } => "call_timeout",
            CallError::Downstream { .. } => "downstream_error",
            CallError::FallbackExhausted { .. } => "fallback_exhausted",
        }
    }
}

/// The only error a fallback is allowed to produce.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("service unavailable: {reason}")]
pub struct FallbackExhausted {
    pub reason: String,
}

impl FallbackExhausted {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// HTTP-facing error union. See `http::response` for the status mapping.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API Key is missing.")]
    MissingCredential,

    #[error("Too many requests for this API Key.")]
    RateLimitExceeded { retry_after: Duration },

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("bad request: {0}")]
    BadRequest(String),
}
