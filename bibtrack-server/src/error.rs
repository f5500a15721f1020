//! Error types for the BibTrack server
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum Error {
    /// Official race time requested while the clock is not running
    #[error("Race clock is not running")]
    ClockNotRunning,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Frame/track source errors
    #[error("Source error: {0}")]
    Source(String),

    /// OCR service errors
    #[error("OCR error: {0}")]
    Ocr(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the server Error
pub type Result<T> = std::result::Result<T, Error>;
