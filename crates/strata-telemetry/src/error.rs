//! Error types for telemetry setup

use thiserror::Error;

/// Telemetry errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Bad logging option
    #[error("logging error: {0}")]
    Logging(String),

    /// A global subscriber could not be installed
    #[error("initialization error: {0}")]
    Init(String),

    /// Log file could not be opened
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;
