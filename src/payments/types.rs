//! Payment request and response bodies.

use serde::{Deserialize, Serialize};

/// Inbound payment request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: f64,
    /// Receipt address; no receipt mail is sent without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PaymentRequest {
    /// Reject requests the payment service could never accept.
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id.trim().is_empty() {
            return Err("orderId must not be empty".to_string());
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err("amount must be a positive number".to_string());
        }
        Ok(())
    }

    /// Receipt address, if one was given and is not blank.
    pub fn receipt_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// Body sent to the payment service; the receipt address stays here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder<'a> {
    pub order_id: &'a str,
    pub amount: f64,
}

impl<'a> From<&'a PaymentRequest> for PaymentOrder<'a> {
    fn from(request: &'a PaymentRequest) -> Self {
        Self {
            order_id: &request.order_id,
            amount: request.amount,
        }
    }
}

/// Payment outcome, as returned by the payment service and to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub status: String,
    pub message: String,
}

impl PaymentResponse {
    pub fn of(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
        }
    }
}
