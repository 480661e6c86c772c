//! Thin JSON-over-HTTP client for downstream services.
//!
//! Deadlines are not enforced here; the protected call executor races every
//! request against its own deadline and drops the future when it loses.

use reqwest::Client;
use serde::Serialize;

use crate::error::DownstreamError;

#[derive(Clone)]
pub struct DownstreamClient {
    http: Client,
    base_url: String,
}

impl DownstreamClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` as JSON to `path` and return the response body.
    ///
    /// Non-2xx answers become [`DownstreamError::status`] with the body as
    /// payload; anything that prevents an answer becomes
    /// [`DownstreamError::transport`].
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, DownstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DownstreamError::transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DownstreamError::transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Downstream returned error status");
            return Err(DownstreamError::status(status.as_u16(), text));
        }
        Ok(text)
    }
}

/// Shared HTTP client for all downstream services.
///
/// Downstreams are internal, so system proxies are bypassed.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder().no_proxy().build()
}
