//! Client TLS identity
//!
//! Both remote targets (the log-ingestion endpoint and the search
//! service) require mutual TLS with operator-supplied PEM files: a CA
//! bundle to verify the server and a client certificate/key pair to
//! present. This crate loads that material once at startup and turns it
//! into the two client shapes the proxy needs:
//!
//! - a [`tokio_rustls::TlsConnector`] for raw pooled streams
//! - an authenticated [`reqwest::Client`] for request/response traffic
//!
//! Any problem with the files is a startup-fatal configuration error;
//! nothing here is retried at runtime.

mod error;
mod identity;

pub use error::{IdentityError, Result};
pub use identity::TlsIdentity;
