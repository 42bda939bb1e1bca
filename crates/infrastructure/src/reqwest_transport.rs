//! HTTP transport backed by a shared `reqwest` client.

use async_trait::async_trait;
use mivaapi_application::{Transport, TransportRequest, TransportResponse};
use mivaapi_core::{ApiError, ApiResult};
use tracing::debug;

/// Transport adapter that dispatches requests over a `reqwest` client.
///
/// Error HTTP statuses are returned as data; only connection-level
/// failures become errors. Connection pooling, TLS, and socket timeouts
/// belong to the injected `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Creates a transport from a caller-configured client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> ApiResult<TransportResponse> {
        let response = self
            .http_client
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();

        debug!(status = %status, url = %request.url, "API transport exchange complete");

        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
