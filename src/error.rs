//! Error types for Apisnare

use std::io;
use thiserror::Error;

/// Result type for Apisnare operations
pub type Result<T> = std::result::Result<T, SnareError>;

/// Errors that can occur in Apisnare
#[derive(Debug, Error)]
pub enum SnareError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Browser automation failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// A capture session is already running
    #[error("A capture session is already running")]
    SessionActive,

    /// The background session task failed or was aborted
    #[error("Session task failed: {0}")]
    SessionTask(String),

    /// Record export failure
    #[error("Export error: {0}")]
    Export(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
