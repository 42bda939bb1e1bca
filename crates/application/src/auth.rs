//! Request signing for the two supported authentication schemes.
//!
//! Both schemes sign the exact serialized request body and emit a single
//! `X-Miva-API-Authorization` header. Signing is read-only: the body must
//! be re-signed whenever it changes.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use mivaapi_core::{ApiError, ApiResult};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

/// The authentication header emitted by every scheme.
pub const AUTH_HEADER_NAME: &str = "X-Miva-API-Authorization";

/// Digest used for shared-secret request signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacDigest {
    /// Legacy HMAC-SHA1.
    Sha1,
    /// HMAC-SHA256, the default.
    Sha256,
}

impl HmacDigest {
    /// Parses a digest name, case-insensitively.
    pub fn from_name(name: &str) -> ApiResult<Self> {
        match name.to_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(ApiError::InvalidValue(format!(
                "invalid HMAC type \"{name}\"; valid HMAC types: \"sha1\", \"sha256\""
            ))),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }
}

/// Shared-secret (access token) authentication.
///
/// With a secret configured, requests are signed with a keyed hash over
/// the body using the base64-decoded secret. Without one, the header
/// degrades to the bare `MIVA <token>` form.
#[derive(Clone)]
pub struct TokenAuth {
    access_token: String,
    secret: String,
    digest: Option<HmacDigest>,
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenAuth")
            .field("access_token", &self.access_token)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl TokenAuth {
    /// Creates a token authentication scheme.
    ///
    /// `secret` is the base64-encoded signing key; an empty secret or an
    /// empty `digest` name disables signing. Otherwise `digest` must name
    /// a supported HMAC digest.
    pub fn new(
        access_token: impl Into<String>,
        secret: impl Into<String>,
        digest: &str,
    ) -> ApiResult<Self> {
        let secret = secret.into();

        let digest = if digest.is_empty() || secret.is_empty() {
            None
        } else {
            Some(HmacDigest::from_name(digest)?)
        };

        Ok(Self {
            access_token: access_token.into(),
            secret,
            digest,
        })
    }

    /// Returns the configured access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    fn header_value(&self, body: &[u8]) -> ApiResult<String> {
        let Some(digest) = self.digest else {
            return Ok(format!("MIVA {}", self.access_token));
        };

        let key = BASE64.decode(&self.secret).map_err(|error| {
            ApiError::MalformedPayload(format!("signing key is not valid base64: {error}"))
        })?;

        let signature = match digest {
            HmacDigest::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(&key).map_err(|error| {
                    ApiError::MalformedPayload(format!("unusable signing key: {error}"))
                })?;
                mac.update(body);
                mac.finalize().into_bytes().to_vec()
            }
            HmacDigest::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(&key).map_err(|error| {
                    ApiError::MalformedPayload(format!("unusable signing key: {error}"))
                })?;
                mac.update(body);
                mac.finalize().into_bytes().to_vec()
            }
        };

        Ok(format!(
            "MIVA-HMAC-{} {}:{}",
            digest.label(),
            self.access_token,
            BASE64.encode(signature)
        ))
    }
}

/// Digest used for asymmetric request signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshDigest {
    /// RSA with SHA-256, the default.
    Sha256,
    /// RSA with SHA-512.
    Sha512,
}

impl SshDigest {
    /// Parses a digest name. Only `sha256` and `sha512` are supported.
    pub fn from_name(name: &str) -> ApiResult<Self> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(ApiError::InvalidValue(
                "SSH authentication algorithm must be one of: \"sha256\", \"sha512\""
                    .to_owned(),
            )),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA2-256",
            Self::Sha512 => "SHA2-512",
        }
    }
}

/// Signing function override for deterministic tests: body bytes and PEM
/// key material in, raw signature bytes out.
pub type SshSignerFn = dyn Fn(&[u8], &str, SshDigest) -> ApiResult<Vec<u8>> + Send + Sync;

/// Asymmetric (SSH key) authentication.
#[derive(Clone)]
pub struct SshAuth {
    username: String,
    private_key: String,
    digest: SshDigest,
    signer: Option<Arc<SshSignerFn>>,
}

impl SshAuth {
    /// Creates an SSH authentication scheme from a username, a PEM RSA
    /// private key, and an algorithm name (`sha256` or `sha512`).
    pub fn new(
        username: impl Into<String>,
        private_key: impl Into<String>,
        algorithm: &str,
    ) -> ApiResult<Self> {
        Ok(Self {
            username: username.into(),
            private_key: private_key.into(),
            digest: SshDigest::from_name(algorithm)?,
            signer: None,
        })
    }

    /// Replaces the RSA signing routine, for tests that need a
    /// deterministic signature without real key material.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<SshSignerFn>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Returns the configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the configured digest.
    #[must_use]
    pub fn digest(&self) -> SshDigest {
        self.digest
    }

    fn header_value(&self, body: &[u8]) -> ApiResult<String> {
        let signature = match &self.signer {
            Some(signer) => signer(body, &self.private_key, self.digest)?,
            None => self.rsa_sign(body)?,
        };

        Ok(format!(
            "SSH-RSA-{} {}:{}",
            self.digest.label(),
            BASE64.encode(self.username.as_bytes()),
            BASE64.encode(signature)
        ))
    }

    fn rsa_sign(&self, body: &[u8]) -> ApiResult<Vec<u8>> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&self.private_key)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&self.private_key))
            .map_err(|_| {
                ApiError::MalformedPayload("invalid SSH private key provided".to_owned())
            })?;

        let signature = match self.digest {
            SshDigest::Sha256 => SigningKey::<Sha256>::new(private_key)
                .try_sign(body)
                .map(|signature| signature.to_vec()),
            SshDigest::Sha512 => SigningKey::<Sha512>::new(private_key)
                .try_sign(body)
                .map(|signature| signature.to_vec()),
        };

        signature.map_err(|error| {
            ApiError::MalformedPayload(format!(
                "unable to sign request with provided SSH private key: {error}"
            ))
        })
    }
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SshAuth")
            .field("username", &self.username)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

/// The closed set of authentication schemes.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// Shared-secret access-token authentication.
    Token(TokenAuth),
    /// Asymmetric SSH-key authentication.
    Ssh(SshAuth),
}

impl AuthScheme {
    /// Computes the authentication header for the exact serialized body.
    ///
    /// Returns the header as a name/value pair to merge into the outgoing
    /// request.
    pub fn auth_header(&self, body: &[u8]) -> ApiResult<(&'static str, String)> {
        let value = match self {
            Self::Token(token) => token.header_value(body)?,
            Self::Ssh(ssh) => ssh.header_value(body)?,
        };

        Ok((AUTH_HEADER_NAME, value))
    }
}
