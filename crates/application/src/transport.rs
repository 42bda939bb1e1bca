use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use mivaapi_core::ApiResult;

/// An outgoing request handed to the transport.
#[derive(Debug)]
pub struct TransportRequest {
    /// HTTP method; always `POST` for the JSON API.
    pub method: Method,
    /// Fully-qualified endpoint URL.
    pub url: String,
    /// All request headers, including the authentication header.
    pub headers: HeaderMap,
    /// The exact signed body bytes. The transport must send them
    /// unmodified or the signature will not verify.
    pub body: Vec<u8>,
}

/// The transport's view of a completed exchange.
#[derive(Debug)]
pub struct TransportResponse {
    /// HTTP status code. Error statuses are data here, not failures: the
    /// protocol reports per-function errors inside 2xx bodies too.
    pub status: StatusCode,
    /// Response headers, needed for partial-batch detection.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: String,
}

/// Port for dispatching a finished request over HTTP.
///
/// Infrastructure provides the real client; tests provide fakes. The call
/// is the one async boundary in the request lifecycle: it must fully
/// complete before decoding begins. Implementations own no retry or
/// timeout policy; only connection-level failures should surface as
/// `ApiError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the complete response.
    async fn send(&self, request: TransportRequest) -> ApiResult<TransportResponse>;
}
