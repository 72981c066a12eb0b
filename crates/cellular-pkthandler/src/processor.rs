//! Receive-side line processing.
//!
//! A [`LineProcessor`] turns the raw byte stream from the modem into
//! classified packets and hands them to [`PacketHandler::handle_packet`]:
//!
//! 1. Buffer the bytes and drop line terminators at the front.
//! 2. Offer the buffer to the input-buffer callback, then to the armed
//!    data-send-prefix or data-prefix callback.
//! 3. Split one line and classify it against the request in flight.
//! 4. Assemble solicited lines into an [`AtResponse`] until a final result
//!    code arrives; dispatch everything else immediately.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cellular_at_core::{is_prefix_present_with, matches_any_prefix, AtCommandType, AtResponse, LineCodec};
use crossbeam_channel::Receiver;
use tracing::{debug, error, trace, warn};

use crate::context::{PacketHandler, ReceiveView};
use crate::error::{PktError, PktResult};
use crate::pkthandler::Packet;
use crate::request::DataSpan;

/// Classification of one received line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Part of the response to the request in flight.
    Solicited,
    /// An unsolicited result code.
    Unsolicited,
    /// Neither.
    Undefined,
}

/// Classify `line` against the request currently in flight on `handler`.
pub fn classify_line(handler: &PacketHandler, line: &str) -> MessageType {
    classify(handler, &handler.receive_view(), line)
}

fn classify(handler: &PacketHandler, view: &ReceiveView, line: &str) -> MessageType {
    if handler.tokens().is_urc_without_prefix(line) {
        return MessageType::Unsolicited;
    }

    let in_flight = view.command_type.is_in_flight();
    let prefixed = is_prefix_present_with(line, &handler.config().prefix_leading_chars).unwrap_or(false);

    if prefixed {
        let expected = view
            .response_prefix
            .as_deref()
            .is_some_and(|prefix| !prefix.is_empty() && line.starts_with(prefix));
        if in_flight && expected {
            MessageType::Solicited
        } else {
            MessageType::Unsolicited
        }
    } else if in_flight
        && (view.response_prefix.is_none()
            || matches!(
                view.command_type,
                AtCommandType::WithPrefix
                    | AtCommandType::MultiWithPrefix
                    | AtCommandType::MultiDataWithoutPrefix
            ))
    {
        MessageType::Solicited
    } else {
        MessageType::Undefined
    }
}

/// Outcome of matching a solicited line against the result code tables.
enum ResultCode {
    Success,
    Error,
    Intermediate,
}

/// Incremental parser for the modem's receive stream.
pub struct LineProcessor {
    handler: Arc<PacketHandler>,
    codec: LineCodec,
    response: Option<AtResponse>,
}

impl LineProcessor {
    /// Create a processor whose buffer limit comes from the handler's config.
    pub fn new(handler: Arc<PacketHandler>) -> Self {
        let codec = LineCodec::with_max_len(handler.config().read_buffer_size);
        LineProcessor {
            handler,
            codec,
            response: None,
        }
    }

    /// Bytes received but not yet processed.
    pub fn buffered_len(&self) -> usize {
        self.codec.buffered_len()
    }

    /// Process a chunk of received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        if let Err(e) = self.codec.push(bytes) {
            warn!("{}; discarding receive buffer", e);
            self.reset();
            return;
        }
        self.process();
    }

    fn reset(&mut self) {
        if !self.codec.is_empty() {
            trace!("Discarding [{}]", self.codec.buffer_as_str());
        }
        self.codec.clear();
        self.response = None;
    }

    fn process(&mut self) {
        loop {
            self.codec.skip_line_endings();
            if self.codec.is_empty() || !self.offer_input_buffer() {
                return;
            }
            self.codec.skip_line_endings();
            if self.codec.is_empty() {
                return;
            }

            let view = self.handler.receive_view();
            let span = match self.find_data_span(&view) {
                Ok(span) => span,
                Err(e) => {
                    trace!("Receive buffer held: {}", e);
                    return;
                }
            };

            if let Some(span) = span {
                if let Err(e) = self.process_data(&view, span) {
                    trace!(
                        "{}: {} of {} bytes buffered",
                        e,
                        self.codec.buffered_len(),
                        span.offset + span.len
                    );
                    return;
                }
                continue;
            }

            match self.codec.decode_line() {
                Some(line) => self.process_line(&view, &line),
                None => return,
            }
        }
    }

    /// Returns `false` when processing should stop until more bytes arrive.
    fn offer_input_buffer(&mut self) -> bool {
        let Some(callback) = self.handler.input_buffer_callback() else {
            return true;
        };
        match callback(self.codec.buffer()) {
            Ok(handled) => {
                trace!("Input buffer callback handled {} bytes", handled);
                self.codec.advance(handled);
                true
            }
            Err(PktError::SizeMismatch) => false,
            Err(PktError::PrefixMismatch) => true,
            Err(e) => {
                warn!("Input buffer callback failed: {}; discarding receive buffer", e);
                self.reset();
                false
            }
        }
    }

    /// Any error means stop until more bytes arrive.
    fn find_data_span(&mut self, view: &ReceiveView) -> PktResult<Option<DataSpan>> {
        if let Some(callback) = &view.data_send_prefix {
            callback(self.codec.buffer_mut())?;
            self.codec.skip_line_endings();
            return Ok(None);
        }

        let Some(callback) = &view.data_prefix else {
            return Ok(None);
        };
        match callback(self.codec.buffer()) {
            Ok(Some(span)) if span.offset + span.len > 0 => Ok(Some(span)),
            Ok(_) => Ok(None),
            Err(PktError::SizeMismatch) => Err(PktError::SizeMismatch),
            Err(e) => {
                warn!("Data prefix callback failed: {}", e);
                Err(e)
            }
        }
    }

    fn process_data(&mut self, view: &ReceiveView, span: DataSpan) -> PktResult<()> {
        if self.codec.buffered_len() < span.offset + span.len {
            return Err(PktError::PendingData);
        }

        let prefix = self.codec.take_bytes(span.offset).unwrap_or_default();
        let prefix = String::from_utf8_lossy(&prefix);
        let prefix = prefix.trim_end_matches(['\r', '\n', '\0']);
        if !prefix.is_empty() {
            self.process_line(view, prefix);
        }

        let Some(payload) = self.codec.take_bytes(span.len) else {
            return Ok(());
        };
        trace!("Received {} data bytes", payload.len());
        self.response.get_or_insert_with(AtResponse::new).data = payload;
        Ok(())
    }

    fn process_line(&mut self, view: &ReceiveView, line: &str) {
        trace!("Received line [{}]", line);
        match classify(&self.handler, view, line) {
            MessageType::Solicited => {
                if let Err(e) = self.process_solicited(view, line) {
                    trace!("Solicited line [{}]: {}", line, e);
                }
            }
            MessageType::Unsolicited => {
                if let Err(e) = self.handler.handle_packet(Packet::Unsolicited(line)) {
                    debug!("URC [{}] not handled: {}", line, e);
                }
            }
            MessageType::Undefined => {
                if let Err(e) = self.handler.handle_packet(Packet::Undefined(line)) {
                    warn!(
                        "Undefined message [{}] while {} in flight: {}; discarding receive buffer",
                        line, view.command_type, e
                    );
                    self.reset();
                }
            }
        }
    }

    fn result_code(&self, view: &ReceiveView, line: &str) -> ResultCode {
        let tokens = self.handler.tokens();
        let matches = |table: &[String]| !table.is_empty() && matches_any_prefix(line, table).unwrap_or(false);

        if matches(&view.extra_success_tokens) || matches(&tokens.success_tokens) {
            ResultCode::Success
        } else if matches(&tokens.error_tokens) {
            ResultCode::Error
        } else {
            ResultCode::Intermediate
        }
    }

    /// Returns [`PktError::PendingBuffer`] while the response is incomplete.
    fn process_solicited(&mut self, view: &ReceiveView, line: &str) -> PktResult<()> {
        match self.result_code(view, line) {
            ResultCode::Success => {
                self.finish_response(true);
                Ok(())
            }
            ResultCode::Error => {
                error!("Modem returned ERROR: line [{}], {} in flight", line, view.command_type);
                self.finish_response(false);
                Ok(())
            }
            ResultCode::Intermediate => {
                let response = self.response.get_or_insert_with(AtResponse::new);
                match view.command_type {
                    AtCommandType::WithPrefix | AtCommandType::WithoutPrefix if !response.lines.is_empty() => {
                        error!(
                            "More than one intermediate line for {}: [{}]; dropping response",
                            view.command_type, line
                        );
                        self.reset();
                        self.finish_response(false);
                        Err(PktError::InvalidData)
                    }
                    _ => {
                        response.push_line(line);
                        Err(PktError::PendingBuffer)
                    }
                }
            }
        }
    }

    fn finish_response(&mut self, status: bool) {
        let mut response = self.response.take().unwrap_or_default();
        response.status = status;
        if let Err(e) = self.handler.handle_packet(Packet::Solicited(&response)) {
            debug!("Solicited response not accepted: {}", e);
        }
    }
}

/// Run a [`LineProcessor`] on its own thread, fed by `rx`.
///
/// The thread exits when every sender of `rx` is dropped.
pub fn spawn_reader(handler: Arc<PacketHandler>, rx: Receiver<Vec<u8>>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cellular-pktio".to_string())
        .spawn(move || {
            let mut processor = LineProcessor::new(handler);
            for chunk in rx.iter() {
                processor.feed(&chunk);
            }
            debug!("Receive channel closed; reader exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PktHandlerConfig;
    use crate::token_map::{TokenMap, TokenMapEntry};
    use crate::token_table::TokenTable;
    use crate::transport::Transport;
    use crate::context::ArmedSlot;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;

    struct NullTransport;

    impl Transport for NullTransport {
        fn send_command(&self, _: &str, _: AtCommandType, _: Option<&str>) -> PktResult<()> {
            Ok(())
        }

        fn send_raw(&self, data: &[u8]) -> usize {
            data.len()
        }
    }

    fn handler(entries: Vec<TokenMapEntry>) -> Arc<PacketHandler> {
        let handler = PacketHandler::new(
            Arc::new(NullTransport),
            TokenTable::new(TokenMap::new(entries)),
            PktHandlerConfig::default(),
        );
        handler.init().unwrap();
        Arc::new(handler)
    }

    /// Arm `handler` as if a request were waiting; returns the response end.
    fn arm(
        handler: &PacketHandler,
        command_type: AtCommandType,
        prefix: Option<&str>,
    ) -> crossbeam_channel::Receiver<PktResult<()>> {
        let (tx, rx) = bounded(1);
        let mut slot = handler.lock_slot();
        *slot = ArmedSlot::default();
        slot.command = Some("AT".to_string());
        slot.command_type = command_type;
        slot.response_prefix = prefix.map(str::to_string);
        slot.responder = Some(tx);
        rx
    }

    fn capture_response(handler: &PacketHandler) -> Arc<Mutex<Option<AtResponse>>> {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        handler.lock_slot().callback = Some(Arc::new(move |resp: &AtResponse| {
            *sink.lock() = Some(resp.clone());
            Ok(())
        }));
        seen
    }

    #[test]
    fn test_classify_without_request() {
        let handler = handler(Vec::new());
        assert_eq!(classify_line(&handler, "+CEREG: 1"), MessageType::Unsolicited);
        assert_eq!(classify_line(&handler, "RDY"), MessageType::Unsolicited);
        assert_eq!(classify_line(&handler, "OK"), MessageType::Undefined);
    }

    #[test]
    fn test_classify_with_prefix_request() {
        let handler = handler(Vec::new());
        let _rx = arm(&handler, AtCommandType::WithPrefix, Some("+CSQ"));

        assert_eq!(classify_line(&handler, "+CSQ: 20,99"), MessageType::Solicited);
        assert_eq!(classify_line(&handler, "+CEREG: 1"), MessageType::Unsolicited);
        assert_eq!(classify_line(&handler, "OK"), MessageType::Solicited);
        assert_eq!(classify_line(&handler, "+CME ERROR: 10"), MessageType::Solicited);
    }

    #[test]
    fn test_classify_without_prefix_request() {
        let handler = handler(Vec::new());
        let _rx = arm(&handler, AtCommandType::WithoutPrefix, None);
        assert_eq!(classify_line(&handler, "861234567890123"), MessageType::Solicited);

        let _rx = arm(&handler, AtCommandType::MultiWithoutPrefix, Some("+X"));
        assert_eq!(classify_line(&handler, "plain"), MessageType::Undefined);
    }

    #[test]
    fn test_with_prefix_response_assembled() {
        let handler = handler(Vec::new());
        let rx = arm(&handler, AtCommandType::WithPrefix, Some("+COPS"));
        let seen = capture_response(&handler);

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"\r\n+COPS: 0,0,\"Carrier\",7\r\n");
        assert!(rx.try_recv().is_err());
        processor.feed(b"\r\nOK\r\n");

        assert_eq!(rx.try_recv().unwrap(), Ok(()));
        let resp = seen.lock().take().unwrap();
        assert!(resp.status);
        assert_eq!(resp.lines, vec!["+COPS: 0,0,\"Carrier\",7".to_string()]);
        assert_eq!(processor.buffered_len(), 0);
    }

    #[test]
    fn test_error_result_code() {
        let handler = handler(Vec::new());
        let rx = arm(&handler, AtCommandType::NoResult, None);

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"\r\n+CME ERROR: 58\r\n");
        assert_eq!(rx.try_recv().unwrap(), Err(PktError::Failure));
    }

    #[test]
    fn test_second_intermediate_line_drops_response() {
        let handler = handler(Vec::new());
        let rx = arm(&handler, AtCommandType::WithoutPrefix, None);
        let seen = capture_response(&handler);

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"first\r\nsecond\r\nOK\r\n");

        assert_eq!(rx.try_recv().unwrap(), Err(PktError::Failure));
        assert!(seen.lock().is_none());
        assert_eq!(processor.buffered_len(), 0);
    }

    #[test]
    fn test_multi_line_response() {
        let handler = handler(Vec::new());
        let rx = arm(&handler, AtCommandType::MultiWithPrefix, Some("+QENG"));
        let seen = capture_response(&handler);

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"+QENG: a\r\n+QENG: b\r\nOK\r\n");

        assert_eq!(rx.try_recv().unwrap(), Ok(()));
        assert_eq!(seen.lock().take().unwrap().lines.len(), 2);
    }

    #[test]
    fn test_data_prefix_payload() {
        let handler = handler(Vec::new());
        let rx = arm(&handler, AtCommandType::MultiDataWithoutPrefix, Some("+QIRD"));
        let seen = capture_response(&handler);
        handler.lock_slot().data_prefix = Some(Arc::new(|buf: &[u8]| {
            const PREFIX: &[u8] = b"+QIRD: 4\r\n";
            if buf.len() < PREFIX.len() && PREFIX.starts_with(buf) {
                return Err(PktError::SizeMismatch);
            }
            if buf.starts_with(PREFIX) {
                Ok(Some(DataSpan { offset: PREFIX.len(), len: 4 }))
            } else {
                Ok(None)
            }
        }));

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"+QIRD: 4\r\n\r\n");
        assert!(rx.try_recv().is_err());
        processor.feed(b"\n\r\nOK\r\n");

        assert_eq!(rx.try_recv().unwrap(), Ok(()));
        let resp = seen.lock().take().unwrap();
        assert_eq!(resp.lines, vec!["+QIRD: 4".to_string()]);
        assert_eq!(&resp.data[..], b"\r\n\n\r");
    }

    #[test]
    fn test_urc_between_response_lines() {
        let urcs = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&urcs);
        let handler = handler(vec![TokenMapEntry::new("CEREG", move |_: &PacketHandler, rest: &str| {
            sink.lock().push(rest.trim().to_string());
        })]);
        let rx = arm(&handler, AtCommandType::WithPrefix, Some("+CSQ"));

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"+CSQ: 20,99\r\n+CEREG: 5\r\nOK\r\n");

        assert_eq!(rx.try_recv().unwrap(), Ok(()));
        assert_eq!(*urcs.lock(), vec!["5".to_string()]);
    }

    #[test]
    fn test_overflow_discards_buffer() {
        let handler = PacketHandler::new(
            Arc::new(NullTransport),
            TokenTable::default(),
            PktHandlerConfig {
                read_buffer_size: 8,
                ..PktHandlerConfig::default()
            },
        );
        handler.init().unwrap();

        let mut processor = LineProcessor::new(Arc::new(handler));
        processor.feed(b"+CEREG");
        assert_eq!(processor.buffered_len(), 6);
        processor.feed(b": 1,5");
        assert_eq!(processor.buffered_len(), 0);
    }

    #[test]
    fn test_input_buffer_callback_consumes_bytes() {
        let handler = handler(Vec::new());
        handler
            .register_input_buffer_callback(Some(Arc::new(|buf: &[u8]| {
                if buf.starts_with(b"@@") {
                    Ok(2)
                } else {
                    Err(PktError::PrefixMismatch)
                }
            })))
            .unwrap();
        let rx = arm(&handler, AtCommandType::NoResult, None);

        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"@@OK\r\n");
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_undefined_line_discards_buffer() {
        let handler = handler(Vec::new());
        let mut processor = LineProcessor::new(Arc::clone(&handler));
        processor.feed(b"garbage\r\nmore");
        assert_eq!(processor.buffered_len(), 0);
    }
}
