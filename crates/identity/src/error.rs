//! Error types for TLS identity loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or applying client TLS material
#[derive(Error, Debug)]
pub enum IdentityError {
    /// A PEM file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PEM file did not contain what it should
    #[error("no usable PEM material in {path}")]
    EmptyPem { path: PathBuf },

    /// PEM parsing failed
    #[error("failed to parse {path}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// rustls rejected the certificate/key combination
    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    /// The HTTPS client could not be built from the material
    #[error("HTTPS client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;
