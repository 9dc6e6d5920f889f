//! Error types for the environment policy

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or applying a capture policy
#[derive(Error, Debug)]
pub enum EnvFilterError {
    /// Policy file could not be read
    #[error("failed to read policy {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Policy file could not be written
    #[error("failed to write policy {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Policy file is not valid JSON
    #[error("failed to parse policy {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A pattern in the policy is not a valid regex
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, EnvFilterError>;
