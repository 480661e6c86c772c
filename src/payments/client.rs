//! Client for the payment service.

use std::time::Duration;

use crate::downstream::DownstreamClient;
use crate::error::{CallError, DownstreamError};
use crate::payments::types::{PaymentOrder, PaymentRequest, PaymentResponse};
use crate::resilience::ProtectedCallExecutor;

/// Logical call name guarding the payment service.
pub const PAYMENT_PROCESS: &str = "payment-process";

const PROCESS_PATH: &str = "/payments/process";

#[derive(Clone)]
pub struct PaymentClient {
    downstream: DownstreamClient,
    executor: ProtectedCallExecutor,
    deadline: Duration,
}

impl PaymentClient {
    pub fn new(downstream: DownstreamClient, executor: ProtectedCallExecutor, deadline: Duration) -> Self {
        Self {
            downstream,
            executor,
            deadline,
        }
    }

    /// Submit the order. No fallback: a payment is never faked.
    pub async fn process(&self, request: &PaymentRequest) -> Result<PaymentResponse, CallError> {
        let downstream = &self.downstream;
        let order = PaymentOrder::from(request);
        self.executor
            .call(PAYMENT_PROCESS, self.deadline, || async move {
                let body = downstream.post_json(PROCESS_PATH, &order).await?;
                serde_json::from_str::<PaymentResponse>(&body).map_err(|e| {
                    DownstreamError::transport(format!("unreadable payment response: {}", e))
                })
            })
            .await
    }
}
