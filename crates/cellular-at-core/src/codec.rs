//! Line-based codec for the modem serial stream.
//!
//! Commands are terminated with carriage return (`\r`). The modem answers
//! with lines terminated by `\r\n`, but payload bytes announced by a data
//! prefix may follow a line directly and are taken out of the buffer by
//! length rather than by terminator.

use bytes::{Bytes, BytesMut};

use crate::error::{AtError, AtResult};

/// Default receive buffer limit, large enough for one TCP segment.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1600;

/// Command terminator.
pub const COMMAND_TERMINATOR: u8 = b'\r';

fn is_line_end(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n' || byte == 0
}

/// A codec for reading modem lines and writing AT commands.
///
/// This handles the line-based nature of the AT protocol:
/// - Accumulates received bytes up to a fixed limit
/// - Splits complete lines at `\r`, `\n` or NUL
/// - Hands out raw payload bytes by length
#[derive(Debug)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Maximum number of buffered bytes.
    max_len: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a codec with the default buffer limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_READ_BUFFER_SIZE)
    }

    /// Create a codec that buffers at most `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(max_len),
            max_len,
        }
    }

    /// Add received data to the buffer.
    ///
    /// Fails without buffering anything if the data would exceed the limit.
    pub fn push(&mut self, data: &[u8]) -> AtResult<()> {
        let actual = self.buffer.len() + data.len();
        if actual > self.max_len {
            log::warn!("receive buffer overflow: {} > {}", actual, self.max_len);
            return Err(AtError::BufferOverflow {
                max: self.max_len,
                actual,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Drop any line terminators at the front of the buffer.
    pub fn skip_line_endings(&mut self) {
        let count = self.buffer.iter().take_while(|&&b| is_line_end(b)).count();
        if count > 0 {
            let _ = self.buffer.split_to(count);
        }
    }

    /// Offset of the first line terminator, if a complete line is buffered.
    pub fn find_line_end(&self) -> Option<usize> {
        self.buffer.iter().position(|&b| is_line_end(b))
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Leading terminators are skipped, so blank lines never surface. Returns
    /// `None` if more data is needed.
    pub fn decode_line(&mut self) -> Option<String> {
        self.skip_line_endings();
        let end = self.find_line_end()?;

        let line_data = self.buffer.split_to(end);
        // Consume the terminator that ended this line.
        let _ = self.buffer.split_to(1);

        Some(String::from_utf8_lossy(&line_data).into_owned())
    }

    /// Take exactly `len` bytes from the front of the buffer.
    ///
    /// Returns `None` if fewer than `len` bytes are buffered.
    pub fn take_bytes(&mut self, len: usize) -> Option<Bytes> {
        if self.buffer.len() < len {
            return None;
        }
        Some(self.buffer.split_to(len).freeze())
    }

    /// Drop `len` bytes from the front of the buffer.
    pub fn advance(&mut self, len: usize) {
        let len = len.min(self.buffer.len());
        let _ = self.buffer.split_to(len);
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(COMMAND_TERMINATOR);
        buf
    }

    /// Buffered bytes.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable access for callbacks that repair the stream in place.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}
