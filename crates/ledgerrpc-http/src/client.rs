//! HTTP transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use ledgerrpc_core::error::{ServiceError, TransportError};
use ledgerrpc_core::transport::{Endpoint, Transport};

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Per-request timeout enforced by the HTTP client.
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One-shot HTTP transport for the ledger service.
///
/// Failures are surfaced as-is; there is no retry, backoff or failover
/// at this layer.
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a new transport for the given service base URL.
    pub fn new(base_url: impl Into<String>, config: HttpTransportConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: trim_trailing_slash(base_url.into()),
            http,
        }
    }

    /// Create with default configuration.
    pub fn default_for(base_url: impl Into<String>) -> Self {
        Self::new(base_url, HttpTransportConfig::default())
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn handle_response(resp: reqwest::Response) -> Result<Value, TransportError> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Validation failures arrive as a decoded error payload;
            // anything else stays a plain HTTP error.
            if let Ok(service) = serde_json::from_str::<ServiceError>(&body) {
                return Err(TransportError::Service(service));
            }
            return Err(TransportError::Http(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(TransportError::Deserialization)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, body: Value) -> Result<Value, TransportError> {
        let url = self.endpoint_url(endpoint);
        tracing::debug!(url = %url, "POST");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Self::handle_response(resp).await
    }

    async fn get(&self, endpoint: Endpoint) -> Result<Value, TransportError> {
        let url = self.endpoint_url(endpoint);
        tracing::debug!(url = %url, "GET");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Self::handle_response(resp).await
    }

    fn url(&self) -> &str {
        &self.base_url
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let t = HttpTransport::default_for("http://localhost:8080//");
        assert_eq!(t.url(), "http://localhost:8080");
        assert_eq!(t.endpoint_url(Endpoint::Query), "http://localhost:8080/query");
    }
}
