/*!
 * Error types for the screenlate engine.
 *
 * This module contains custom error types for the external collaborators
 * (OCR, translation backend, configuration) and the glue stage, using the
 * thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The request could not be completed
    #[error("Translation request failed: {0}")]
    RequestFailed(String),

    /// The backend did not answer within the configured timeout
    #[error("Translation request timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// The backend refused a single block
    #[error("Block rejected by backend: {0}")]
    Rejected(String),

    /// The backend is known to be unreachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the screen capture source or an OCR engine
#[derive(Error, Debug)]
pub enum OcrError {
    /// Screen capture failed
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    /// Text recognition failed
    #[error("Recognition failed for provider {provider}: {message}")]
    RecognitionFailed {
        /// OCR provider id
        provider: String,
        /// Error message from the engine
        message: String,
    },
}

/// Errors raised by the glue stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlueError {
    /// The detector produced more fragments than a sane cycle can hold
    #[error("Too many fragments in one cycle: {count} (limit {limit})")]
    TooManyFragments {
        /// Fragments received
        count: usize,
        /// Configured upper bound
        limit: usize,
    },
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`crate::Config`]
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A language code is not a known ISO 639 code
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the translation backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Error from capture or OCR
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Error from the glue stage
    #[error("Glue error: {0}")]
    Glue(#[from] GlueError),

    /// Error from configuration loading
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
