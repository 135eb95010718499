//! Error types for the admission core.

use thiserror::Error;

/// Main error type for admission-control operations.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for admission-control operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
