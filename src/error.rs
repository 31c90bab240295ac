//! Error types for the Floodgate service.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller supplied an empty identity
    #[error("Identity must be a non-empty string")]
    InvalidIdentity,

    /// The shared store could not be reached, timed out, or returned a
    /// malformed reply. Distinct from an admit/deny decision so the
    /// boundary layer can choose its fail-open/fail-closed policy.
    #[error("Shared store unavailable: {0}")]
    StoreUnavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
