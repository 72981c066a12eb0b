//! Request descriptors and the callback types armed for one request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use cellular_at_core::{AtCommandType, AtResponse};

use crate::error::PktResult;

/// Inspects a solicited response and decides the request's result.
///
/// Runs on the receive thread while the armed slot is locked, so it must not
/// call back into the [`PacketHandler`](crate::PacketHandler).
pub type ResponseCallback = Arc<dyn Fn(&AtResponse) -> PktResult<()> + Send + Sync>;

/// Locates a length-prefixed payload in the receive buffer.
///
/// Returns `Ok(Some(span))` when the buffer starts with a data prefix line,
/// `Ok(None)` when it does not, and `Err(SizeMismatch)` when more bytes are
/// needed to decide.
pub type DataPrefixCallback = Arc<dyn Fn(&[u8]) -> PktResult<Option<DataSpan>> + Send + Sync>;

/// Repairs the receive buffer before line splitting while a data send waits
/// for its prompt.
pub type DataSendPrefixCallback = Arc<dyn Fn(&mut BytesMut) -> PktResult<()> + Send + Sync>;

/// Interprets a line that is neither solicited nor a known URC.
pub type UndefinedRespCallback = Arc<dyn Fn(&str) -> PktResult<()> + Send + Sync>;

/// Receives URC lines that have no entry in the token map.
pub type GenericUrcCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Consumes raw receive bytes ahead of line processing.
///
/// Returns the number of bytes handled, `Err(SizeMismatch)` to wait for more,
/// or `Err(PrefixMismatch)` to leave the buffer to the line parser.
pub type InputBufferCallback = Arc<dyn Fn(&[u8]) -> PktResult<usize> + Send + Sync>;

/// Where a data payload sits in the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSpan {
    /// Offset of the first payload byte. The bytes before it are the prefix
    /// line.
    pub offset: usize,
    /// Payload length in bytes.
    pub len: usize,
}

/// One AT command and how its response is handled.
#[derive(Clone)]
pub struct AtRequest {
    /// Command text without the terminator, e.g. `AT+COPS?`.
    pub command: String,
    /// Expected response shape.
    pub command_type: AtCommandType,
    /// Prefix of the intermediate lines, e.g. `+COPS`.
    pub response_prefix: Option<String>,
    /// Called with the assembled response on success.
    pub callback: Option<ResponseCallback>,
}

impl AtRequest {
    /// Create a request with no prefix and no callback.
    pub fn new(command: impl Into<String>, command_type: AtCommandType) -> Self {
        AtRequest {
            command: command.into(),
            command_type,
            response_prefix: None,
            callback: None,
        }
    }

    /// Set the expected response prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.response_prefix = Some(prefix.into());
        self
    }

    /// Set the response callback.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AtResponse) -> PktResult<()> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for AtRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtRequest")
            .field("command", &self.command)
            .field("command_type", &self.command_type)
            .field("response_prefix", &self.response_prefix)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Raw bytes written after a data send command is accepted.
#[derive(Debug)]
pub struct DataSendRequest<'a> {
    /// Payload bytes.
    pub data: &'a [u8],
    /// Bytes written after the payload, e.g. Ctrl-Z.
    pub end_pattern: Option<&'a [u8]>,
    /// Payload bytes the transport accepted; written by the send.
    pub sent_len: usize,
}

impl<'a> DataSendRequest<'a> {
    /// Create a request for `data`.
    pub fn new(data: &'a [u8]) -> Self {
        DataSendRequest {
            data,
            end_pattern: None,
            sent_len: 0,
        }
    }

    /// Set the end pattern.
    pub fn with_end_pattern(mut self, pattern: &'a [u8]) -> Self {
        self.end_pattern = Some(pattern);
        self
    }
}

/// Timeouts for the two phases of a data send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSendTimeouts {
    /// Wait for the command acknowledgement.
    pub at: Duration,
    /// Wait for the result after the payload.
    pub data: Duration,
    /// Quiet gap before the payload is written.
    pub inter_delay: Duration,
}

impl DataSendTimeouts {
    /// Create timeouts with no inter-delay.
    pub fn new(at: Duration, data: Duration) -> Self {
        DataSendTimeouts {
            at,
            data,
            inter_delay: Duration::ZERO,
        }
    }

    /// Set the inter-delay.
    pub fn with_inter_delay(mut self, inter_delay: Duration) -> Self {
        self.inter_delay = inter_delay;
        self
    }
}
