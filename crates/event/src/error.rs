//! Error types for the event crate

use std::io;

use thiserror::Error;

/// Errors that can occur encoding, decoding, or framing events
#[derive(Error, Debug)]
pub enum EventError {
    /// I/O error while reading from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record is not valid JSON (or not the expected shape)
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Event violates a producer invariant
    #[error("invalid event: {0}")]
    Invalid(String),

    /// A line exceeded the framing limit
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;
