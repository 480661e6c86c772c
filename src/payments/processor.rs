//! Payment processing: charge first, then a best-effort receipt.

use crate::error::CallError;
use crate::mail::MailClient;
use crate::payments::client::PaymentClient;
use crate::payments::types::{PaymentRequest, PaymentResponse};
use tracing::{info, warn};

#[derive(Clone)]
pub struct PaymentService {
    payments: PaymentClient,
    mail: MailClient,
}

impl PaymentService {
    pub fn new(payments: PaymentClient, mail: MailClient) -> Self {
        Self { payments, mail }
    }

    /// Process one payment.
    ///
    /// Fails only when the payment call fails. A receipt that cannot be
    /// sent is logged and otherwise ignored.
    pub async fn process(&self, request: PaymentRequest) -> Result<PaymentResponse, CallError> {
        let response = self.payments.process(&request).await?;
        info!(
            order_id = %request.order_id,
            status = %response.status,
            "Payment approved"
        );

        if let Some(email) = request.receipt_email() {
            match self.mail.send(email).await {
                Ok(_) => info!(order_id = %request.order_id, "Receipt mail sent"),
                Err(e) => warn!(
                    order_id = %request.order_id,
                    kind = e.kind(),
                    error = %e,
                    "Receipt mail not sent"
                ),
            }
        }

        Ok(response)
    }
}
