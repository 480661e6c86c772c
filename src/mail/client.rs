//! Client for the mail service.

use serde::Serialize;
use std::time::Duration;

use crate::downstream::DownstreamClient;
use crate::error::{CallError, FallbackExhausted};
use crate::resilience::ProtectedCallExecutor;

/// Logical call name guarding the mail service.
pub const MAIL_SEND: &str = "mail-send";

const SEND_PATH: &str = "/mail/send";

#[derive(Debug, Serialize)]
struct SendMail<'a> {
    email: &'a str,
}

#[derive(Clone)]
pub struct MailClient {
    downstream: DownstreamClient,
    executor: ProtectedCallExecutor,
    deadline: Duration,
}

impl MailClient {
    pub fn new(downstream: DownstreamClient, executor: ProtectedCallExecutor, deadline: Duration) -> Self {
        Self {
            downstream,
            executor,
            deadline,
        }
    }

    /// Send a mail to `email`, returning the mail service's reply.
    ///
    /// Any failure, including an open circuit or a used-up send limit, ends in
    /// [`CallError::FallbackExhausted`].
    pub async fn send(&self, email: &str) -> Result<String, CallError> {
        tracing::debug!(email = %email, "Attempting to send mail");
        let downstream = &self.downstream;
        self.executor
            .execute(
                MAIL_SEND,
                self.deadline,
                email.to_string(),
                |email| async move { downstream.post_json(SEND_PATH, &SendMail { email: &email }).await },
                |_email, cause| match cause {
                    CallError::RequestNotPermitted { .. } => {
                        Err(FallbackExhausted::new("Mail send limit exceeded"))
                    }
                    _ => Err(FallbackExhausted::new("Mail service temporarily unavailable")),
                },
            )
            .await
    }
}
