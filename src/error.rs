//! Error types for score ingestion, scheduling and seek.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur when loading or playing a score.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The document could not be parsed as well-formed markup.
    ///
    /// Abort the load and surface the message; retrying with the same bytes
    /// cannot succeed.
    #[error("malformed score document: {0}")]
    MalformedDocument(String),

    /// The document parsed but produced zero playable events.
    ///
    /// Callers should treat this as "nothing to play" and keep playback
    /// controls disabled.
    #[error("timeline contains no playable events")]
    EmptyTimeline,

    /// Fetching or extracting the score payload failed.
    ///
    /// Transient; the caller may retry the load manually.
    #[error("score source unavailable: {0}")]
    SourceUnavailable(String),

    /// The notation surface yielded no note columns.
    ///
    /// Purely cosmetic degradation; never escapes the engine API.
    #[error("notation surface not ready: {0}")]
    RenderNotReady(String),

    /// Invalid value for a field.
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Invalid value.
        value: String,
        /// Expected format.
        expected: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for EngineError {
    fn from(err: quick_xml::Error) -> Self {
        EngineError::MalformedDocument(err.to_string())
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(err: zip::result::ZipError) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

impl From<std::num::ParseIntError> for EngineError {
    fn from(err: std::num::ParseIntError) -> Self {
        EngineError::InvalidValue {
            field: "integer".to_string(),
            value: err.to_string(),
            expected: "valid integer".to_string(),
        }
    }
}

impl From<std::num::ParseFloatError> for EngineError {
    fn from(err: std::num::ParseFloatError) -> Self {
        EngineError::InvalidValue {
            field: "float".to_string(),
            value: err.to_string(),
            expected: "valid float".to_string(),
        }
    }
}
