//! Client service, authentication schemes, and the transport port.

#![forbid(unsafe_code)]

mod auth;
mod client;
mod transport;

pub use auth::{
    AUTH_HEADER_NAME, AuthScheme, HmacDigest, SshAuth, SshDigest, SshSignerFn, TokenAuth,
};
pub use client::{BinaryEncoding, Client, ClientOptions};
pub use transport::{Transport, TransportRequest, TransportResponse};
