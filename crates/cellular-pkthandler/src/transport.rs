//! The send side of the modem link.

use std::io::Write;

use cellular_at_core::{AtCommandType, LineCodec};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{PktError, PktResult};

/// Writes commands and raw bytes to the modem.
///
/// Both calls are synchronous and may block on the wire. They are only made
/// by the requester thread while it holds the request lock.
pub trait Transport: Send + Sync {
    /// Write one AT command.
    fn send_command(
        &self,
        command: &str,
        command_type: AtCommandType,
        response_prefix: Option<&str>,
    ) -> PktResult<()>;

    /// Write raw bytes, returning how many were accepted.
    fn send_raw(&self, data: &[u8]) -> usize;
}

/// [`Transport`] over any byte writer, such as an open serial port.
pub struct LineTransport<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineTransport<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        LineTransport {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Transport for LineTransport<W> {
    fn send_command(
        &self,
        command: &str,
        command_type: AtCommandType,
        _response_prefix: Option<&str>,
    ) -> PktResult<()> {
        let frame = LineCodec::encode_command(command);
        let mut writer = self.writer.lock();
        writer
            .write_all(&frame)
            .and_then(|_| writer.flush())
            .map_err(|e| {
                warn!("Failed to write {} [{}]: {}", command_type, command, e);
                PktError::Failure
            })?;
        trace!("Wrote {} bytes for [{}]", frame.len(), command);
        Ok(())
    }

    fn send_raw(&self, data: &[u8]) -> usize {
        let mut writer = self.writer.lock();
        match writer.write(data).and_then(|n| writer.flush().map(|_| n)) {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to write {} raw bytes: {}", data.len(), e);
                0
            }
        }
    }
}
