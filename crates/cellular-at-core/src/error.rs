//! Error types for AT response handling.

use thiserror::Error;

/// Errors that can occur when working with AT response text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AtError {
    /// The input was empty, too long, or otherwise unusable.
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),

    /// The destination buffer cannot hold the result.
    #[error("out of memory: need {needed} bytes, have {available}")]
    NoMemory {
        /// Bytes required by the operation.
        needed: usize,
        /// Bytes available to the operation.
        available: usize,
    },

    /// The text could not be interpreted.
    #[error("failed to parse {0:?}")]
    Parse(String),

    /// Buffered line data exceeded the codec limit.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for AT text operations.
pub type AtResult<T> = Result<T, AtError>;
