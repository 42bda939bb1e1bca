//! The client facade: configuration, header assembly, and the
//! encode → sign → send → decode request lifecycle.

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use mivaapi_core::{ApiError, ApiResult};
use mivaapi_domain::{DecodedResponse, FunctionCall, RequestEncoder};
use url::Url;

use crate::auth::AuthScheme;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// User agent advertised on every request, fixed at compile time.
const USER_AGENT: &str = concat!("mivaapi/", env!("CARGO_PKG_VERSION"));

/// Header carrying the per-request server-side timeout override in seconds.
const TIMEOUT_HEADER: &str = "X-Miva-API-Timeout";

/// Header selecting the encoding of binary fields in the response.
const BINARY_ENCODING_HEADER: &str = "X-Miva-API-Binary-Encoding";

/// Payload encoding for binary response fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryEncoding {
    /// Plain JSON, the server default; no header is sent.
    Json,
    /// Base64-encoded binary fields.
    Base64,
}

impl BinaryEncoding {
    /// Parses an encoding name, case-insensitively.
    pub fn from_name(name: &str) -> ApiResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "base64" => Ok(Self::Base64),
            _ => Err(ApiError::InvalidValue(
                "binary encoding must be one of: \"json\", \"base64\"".to_owned(),
            )),
        }
    }
}

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    url: Url,
    store_code: String,
    timestamp: bool,
    auth: AuthScheme,
    timeout_seconds: Option<u32>,
    binary_encoding: Option<BinaryEncoding>,
    operations_range: Option<String>,
    headers: Vec<(String, String)>,
}

impl ClientOptions {
    /// Creates validated options from the required settings.
    ///
    /// The endpoint must be a parseable URL and the store code non-blank;
    /// authentication material is required by construction. The request
    /// timestamp defaults to on.
    pub fn new(url: &str, store_code: &str, auth: AuthScheme) -> ApiResult<Self> {
        if url.trim().is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "missing required option \"url\"".to_owned(),
            ));
        }

        if store_code.trim().is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "missing required option \"store_code\"".to_owned(),
            ));
        }

        let url = Url::parse(url)
            .map_err(|error| ApiError::InvalidValue(format!("invalid API url: {error}")))?;

        Ok(Self {
            url,
            store_code: store_code.to_owned(),
            timestamp: true,
            auth,
            timeout_seconds: None,
            binary_encoding: None,
            operations_range: None,
            headers: Vec::new(),
        })
    }

    /// Enables or disables the request timestamp field.
    #[must_use]
    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = enabled;
        self
    }

    /// Adds a header sent verbatim on every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the configured endpoint URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the configured store code.
    #[must_use]
    pub fn store_code(&self) -> &str {
        self.store_code.as_str()
    }

    /// Returns the configured authentication scheme.
    #[must_use]
    pub fn auth(&self) -> &AuthScheme {
        &self.auth
    }
}

/// The API client: accumulates function calls and performs the
/// encode → sign → send → decode sequence through an injected transport.
///
/// One client serves one logical request at a time; sending resets the
/// call accumulator so the next request starts clean.
pub struct Client {
    options: ClientOptions,
    encoder: RequestEncoder,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Creates a client from validated options and a transport.
    #[must_use]
    pub fn new(options: ClientOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            options,
            encoder: RequestEncoder::new(),
            transport,
        }
    }

    /// Adds a function call to the pending request.
    pub fn add(&mut self, call: FunctionCall) -> &mut Self {
        self.encoder.add(call);
        self
    }

    /// Returns the distinct function names queued so far.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.encoder.function_names()
    }

    /// Sets the per-request server-side timeout override.
    pub fn set_timeout(&mut self, seconds: u32) -> ApiResult<&mut Self> {
        if seconds == 0 {
            return Err(ApiError::InvalidValue(
                "timeout value must be greater than zero".to_owned(),
            ));
        }

        self.options.timeout_seconds = Some(seconds);
        Ok(self)
    }

    /// Sets the binary encoding mode. `json` restores the server default
    /// and suppresses the header.
    pub fn set_binary_encoding(&mut self, encoding: &str) -> ApiResult<&mut Self> {
        self.options.binary_encoding = match BinaryEncoding::from_name(encoding)? {
            BinaryEncoding::Json => None,
            BinaryEncoding::Base64 => Some(BinaryEncoding::Base64),
        };

        Ok(self)
    }

    /// Sets the operations range for resuming a partially completed
    /// batch, as reported by a partial response's content range.
    pub fn set_operations_range(&mut self, start: u64, end: Option<u64>) -> ApiResult<&mut Self> {
        if start < 1 {
            return Err(ApiError::InvalidValue(
                "range start must be at least 1".to_owned(),
            ));
        }

        if let Some(end) = end
            && end < start
        {
            return Err(ApiError::InvalidValue(
                "range end must be greater than or equal to the start value".to_owned(),
            ));
        }

        self.options.operations_range = Some(match end {
            Some(end) => format!("Operations={start}-{end}"),
            None => format!("Operations={start}-"),
        });

        Ok(self)
    }

    /// Clears a previously set operations range.
    pub fn clear_operations_range(&mut self) -> &mut Self {
        self.options.operations_range = None;
        self
    }

    /// Serializes the pending request body without sending it.
    pub fn request_body(&self) -> ApiResult<String> {
        let document = self
            .encoder
            .finalize(self.options.store_code.as_str(), self.options.timestamp)?;

        String::from_utf8(document.to_bytes()?)
            .map_err(|error| ApiError::MalformedPayload(error.to_string()))
    }

    /// Sends the pending request and decodes the response against the
    /// request's function manifest.
    pub async fn send(&mut self) -> ApiResult<DecodedResponse> {
        let (manifest, response) = self.dispatch().await?;

        DecodedResponse::decode(
            &manifest,
            &response.body,
            response.status,
            &response.headers,
        )
    }

    /// Sends the pending request and returns the raw transport response
    /// without decoding.
    pub async fn send_raw(&mut self) -> ApiResult<TransportResponse> {
        let (_, response) = self.dispatch().await?;

        Ok(response)
    }

    async fn dispatch(
        &mut self,
    ) -> ApiResult<(mivaapi_domain::FunctionManifest, TransportResponse)> {
        let document = self
            .encoder
            .finalize(self.options.store_code.as_str(), self.options.timestamp)?;
        let body = document.to_bytes()?;

        let mut headers = self.request_headers()?;
        let (auth_name, auth_value) = self.options.auth.auth_header(&body)?;
        headers.insert(
            header_name(auth_name)?,
            header_value(auth_name, &auth_value)?,
        );

        tracing::debug!(
            url = %self.options.url,
            functions = ?self.encoder.function_names(),
            "dispatching API request"
        );

        let request = TransportRequest {
            method: Method::POST,
            url: self.options.url.as_str().to_owned(),
            headers,
            body,
        };

        let response = self.transport.send(request).await?;

        tracing::debug!(status = %response.status, "API response received");

        // The request is consumed whether or not decoding succeeds; the
        // next logical request starts from an empty builder.
        self.encoder.reset();

        Ok((document.manifest().clone(), response))
    }

    fn request_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            http::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );

        for (name, value) in &self.options.headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        if let Some(seconds) = self.options.timeout_seconds {
            headers.insert(
                header_name(TIMEOUT_HEADER)?,
                header_value(TIMEOUT_HEADER, &seconds.to_string())?,
            );
        }

        if self.options.binary_encoding == Some(BinaryEncoding::Base64) {
            headers.insert(
                header_name(BINARY_ENCODING_HEADER)?,
                HeaderValue::from_static("base64"),
            );
        }

        if let Some(range) = &self.options.operations_range {
            headers.insert(http::header::RANGE, header_value("Range", range)?);
        }

        Ok(headers)
    }
}

fn header_name(name: &str) -> ApiResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ApiError::InvalidValue(format!("invalid header name \"{name}\"")))
}

fn header_value(name: &str, value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::InvalidValue(format!("invalid value for header \"{name}\"")))
}
