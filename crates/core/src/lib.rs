//! Shared primitives for all Rust crates in the Miva API workspace.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the API client crates.
pub type ApiResult<T> = Result<T, ApiError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> ApiResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ApiError::InvalidValue(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common error categories for the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed caller input: blank name or value, unsupported algorithm,
    /// unknown function name, out-of-range index.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A required field or configuration option is absent.
    #[error("missing required value: {0}")]
    MissingRequiredValue(String),

    /// A payload could not be serialized or deserialized, or key material
    /// was unusable for signing.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Connection-level transport failure. HTTP error statuses are not
    /// reported here; they flow through response decoding as data.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::NonEmptyString;

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_keeps_original_value() {
        let value = NonEmptyString::new(" PS ").map(String::from);
        assert_eq!(value.ok().as_deref(), Some(" PS "));
    }
}
