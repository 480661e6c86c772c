//! Error responses.
//!
//! | error                  | status |
//! |------------------------|--------|
//! | MissingCredential      | 401    |
//! | RateLimitExceeded      | 429    |
//! | BadRequest             | 400    |
//! | CallRefused            | 503    |
//! | RequestNotPermitted    | 503    |
//! | FallbackExhausted      | 503    |
//! | CallTimeout            | 504    |
//! | Downstream             | 502    |
//!
//! Bodies are `{"error": <code>, "message": <text>}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{CallError, GatewayError};

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingCredential => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Call(CallError::CallRefused { .. })
            | GatewayError::Call(CallError::RequestNotPermitted { .. })
            | GatewayError::Call(CallError::FallbackExhausted { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Call(CallError::CallTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Call(CallError::Downstream { .. }) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn client_code(&self) -> &'static str {
        match self {
            GatewayError::MissingCredential => "MISSING_API_KEY",
            GatewayError::RateLimitExceeded { .. } => "RATE_LIMITED",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::Call(CallError::CallRefused { .. }) => "CIRCUIT_OPEN",
            GatewayError::Call(CallError::RequestNotPermitted { .. }) => "CALL_LIMIT_EXCEEDED",
            GatewayError::Call(CallError::FallbackExhausted { .. }) => "SERVICE_UNAVAILABLE",
            GatewayError::Call(CallError::CallTimeout { .. }) => "UPSTREAM_TIMEOUT",
            GatewayError::Call(CallError::Downstream { .. }) => "UPSTREAM_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.client_code(),
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
