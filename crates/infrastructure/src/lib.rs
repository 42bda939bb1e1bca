//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
