//! Error types for the hub

use std::io;

use thiserror::Error;

/// Errors in subscriber registration and delivery
#[derive(Error, Debug)]
pub enum HubError {
    /// I/O error on a subscriber socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A filter expression could not be parsed
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;
