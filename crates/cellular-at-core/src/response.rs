//! AT command types and assembled responses.

use bytes::Bytes;
use std::fmt;

/// How the modem is expected to answer an AT command.
///
/// The type decides which incoming lines belong to the command in flight and
/// how many intermediate lines a response may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AtCommandType {
    /// Only a final result code is expected.
    NoResult,
    /// One intermediate line starting with the response prefix.
    WithPrefix,
    /// One intermediate line without a prefix.
    WithoutPrefix,
    /// Any number of lines starting with the response prefix.
    MultiWithPrefix,
    /// Any number of lines without a prefix.
    MultiWithoutPrefix,
    /// Prefix lines followed by raw payload bytes.
    MultiDataWithoutPrefix,
    /// No command is in flight.
    #[default]
    NoCommand,
}

impl AtCommandType {
    /// Returns the type as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AtCommandType::NoResult => "no_result",
            AtCommandType::WithPrefix => "with_prefix",
            AtCommandType::WithoutPrefix => "without_prefix",
            AtCommandType::MultiWithPrefix => "multi_with_prefix",
            AtCommandType::MultiWithoutPrefix => "multi_without_prefix",
            AtCommandType::MultiDataWithoutPrefix => "multi_data_without_prefix",
            AtCommandType::NoCommand => "no_command",
        }
    }

    /// Whether a command of this type is waiting for the modem.
    pub const fn is_in_flight(&self) -> bool {
        !matches!(self, AtCommandType::NoCommand)
    }

    /// Whether the response may carry more than one intermediate line.
    pub const fn is_multi_line(&self) -> bool {
        matches!(
            self,
            AtCommandType::MultiWithPrefix
                | AtCommandType::MultiWithoutPrefix
                | AtCommandType::MultiDataWithoutPrefix
        )
    }
}

impl fmt::Display for AtCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete solicited response: intermediate lines plus the final result.
///
/// `status` is true when the final result code was a success token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtResponse {
    /// Whether the modem reported success.
    pub status: bool,
    /// Intermediate lines in arrival order, without line terminators.
    pub lines: Vec<String>,
    /// Raw payload bytes for data responses.
    pub data: Bytes,
}

impl AtResponse {
    /// Create an empty response in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a successful response carrying `lines`.
    pub fn success<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AtResponse {
            status: true,
            lines: lines.into_iter().map(Into::into).collect(),
            data: Bytes::new(),
        }
    }

    /// Create a response for a modem error result.
    pub fn error() -> Self {
        AtResponse {
            status: false,
            ..Self::default()
        }
    }

    /// Append an intermediate line.
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// First intermediate line, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// Whether any intermediate line has been collected.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_flags() {
        assert!(!AtCommandType::NoCommand.is_in_flight());
        assert!(AtCommandType::NoResult.is_in_flight());
        assert!(AtCommandType::MultiDataWithoutPrefix.is_multi_line());
        assert!(!AtCommandType::WithPrefix.is_multi_line());
        assert_eq!(AtCommandType::default(), AtCommandType::NoCommand);
        assert_eq!(AtCommandType::WithPrefix.to_string(), "with_prefix");
    }

    #[test]
    fn test_response_builders() {
        let resp = AtResponse::success(["+COPS: 0,0,\"Carrier\",7"]);
        assert!(resp.status);
        assert_eq!(resp.first_line(), Some("+COPS: 0,0,\"Carrier\",7"));

        let err = AtResponse::error();
        assert!(!err.status);
        assert!(err.is_empty());
    }
}
