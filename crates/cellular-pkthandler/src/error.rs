//! Error types for the packet handler.

use cellular_at_core::AtError;
use thiserror::Error;

/// Status kinds reported by the packet handler.
///
/// `Ok` is the `Ok(())` arm of [`PktResult`]. Timeouts are distinct from
/// modem-reported failures so callers can retry the former and treat the
/// latter as terminal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PktError {
    /// The context is not initialized.
    #[error("invalid handle: context not initialized")]
    InvalidHandle,

    /// A caller-supplied argument is malformed.
    #[error("bad parameter")]
    BadParameter,

    /// The request descriptor is incomplete.
    #[error("bad request")]
    BadRequest,

    /// The modem reported an error, a handler signaled failure, or an
    /// internal invariant was violated.
    #[error("failure")]
    Failure,

    /// No response arrived before the deadline.
    #[error("timed out waiting for response")]
    TimedOut,

    /// The transport accepted fewer bytes than requested.
    #[error("transport accepted fewer bytes than requested")]
    SendError,

    /// A data prefix callback needs more buffered bytes to decide.
    #[error("size mismatch: more data required")]
    SizeMismatch,

    /// No handler is registered for a URC token.
    #[error("prefix mismatch")]
    PrefixMismatch,

    /// An undefined line could not be interpreted.
    #[error("invalid data")]
    InvalidData,

    /// A response is partially assembled and more lines are expected.
    #[error("pending data")]
    PendingData,

    /// A data response is waiting for its payload bytes.
    #[error("pending buffer")]
    PendingBuffer,
}

impl From<AtError> for PktError {
    fn from(err: AtError) -> Self {
        match err {
            AtError::BadParameter(_) => PktError::BadParameter,
            _ => PktError::Failure,
        }
    }
}

/// Result type alias for packet handler operations.
pub type PktResult<T> = Result<T, PktError>;

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
