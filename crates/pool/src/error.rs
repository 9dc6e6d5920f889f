//! Error types for the connection pool

use thiserror::Error;

/// Errors establishing a single outbound connection
#[derive(Error, Debug)]
pub enum DialError {
    /// TCP connect or TLS handshake failed
    #[error("connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The deadline elapsed before the connection was ready
    #[error("connection to {target} timed out")]
    Timeout { target: String },

    /// The configured server name is not a valid TLS name
    #[error("invalid server name {name:?}")]
    InvalidServerName { name: String },
}

/// Errors surfaced by the pool to its callers
#[derive(Error, Debug)]
pub enum PoolError {
    /// No idle handle and the dial failed; the caller decides what to drop
    #[error("target unavailable: {0}")]
    Unavailable(#[source] DialError),
}

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
