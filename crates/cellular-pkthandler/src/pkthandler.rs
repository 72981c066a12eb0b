//! Request/response correlation and packet delivery.
//!
//! Requesters call the `request*` and `data_send*` family; the receive thread
//! calls [`PacketHandler::handle_packet`]. A request arms the slot, sends the
//! command, waits on its response channel and then disarms the slot again,
//! whatever the outcome.

use std::thread;
use std::time::Duration;

use cellular_at_core::{duplicate, AtCommandType, AtResponse};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use tracing::{debug, error, trace, warn};

use crate::context::{ArmedSlot, PacketHandler};
use crate::error::{PktError, PktResult};
use crate::metric_defs;
use crate::request::{AtRequest, DataPrefixCallback, DataSendPrefixCallback, DataSendRequest, DataSendTimeouts};

/// A unit delivered by the receive path, tagged with its classification.
#[derive(Debug, Clone, Copy)]
pub enum Packet<'a> {
    /// The response to the request in flight.
    Solicited(&'a AtResponse),
    /// An unsolicited result code line.
    Unsolicited(&'a str),
    /// A line that fits neither of the above.
    Undefined(&'a str),
}

/// Extra state armed for one request besides the request descriptor.
#[derive(Default)]
struct Arming {
    data_prefix: Option<DataPrefixCallback>,
    data_send_prefix: Option<DataSendPrefixCallback>,
    extra_success_tokens: Vec<String>,
}

fn owned_tokens(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

impl PacketHandler {
    // ========================================================================
    // Requests
    // ========================================================================

    /// Send `req` and wait up to `timeout` for its response.
    ///
    /// Returns `Ok(())` when the modem answered with a success result code and
    /// the response callback, if any, accepted the response.
    pub fn request_with_timeout(&self, req: &AtRequest, timeout: Duration) -> PktResult<()> {
        self.check_request(req)?;
        let _request = self.request_lock.lock();
        self.ensure_active()?;
        self.exchange(req, timeout, Arming::default())
    }

    /// Send `req` with the configured default timeout.
    pub fn request(&self, req: &AtRequest) -> PktResult<()> {
        self.request_with_timeout(req, self.config().default_timeout())
    }

    /// Send `req` with a data prefix callback armed for its response.
    ///
    /// The receive path consults `data_prefix` to find length-prefixed
    /// payload bytes embedded in the response.
    pub fn request_data_recv(
        &self,
        req: &AtRequest,
        timeout: Duration,
        data_prefix: DataPrefixCallback,
    ) -> PktResult<()> {
        self.check_request(req)?;
        let _request = self.request_lock.lock();
        self.ensure_active()?;
        let arming = Arming {
            data_prefix: Some(data_prefix),
            ..Arming::default()
        };
        self.exchange(req, timeout, arming)
    }

    /// Send `req` with the default timeout, also accepting any of
    /// `success_tokens` as a successful final result code.
    pub fn request_success_token(&self, req: &AtRequest, success_tokens: &[&str]) -> PktResult<()> {
        self.request_success_token_with_timeout(req, self.config().default_timeout(), success_tokens)
    }

    /// [`PacketHandler::request_success_token`] with an explicit timeout.
    pub fn request_success_token_with_timeout(
        &self,
        req: &AtRequest,
        timeout: Duration,
        success_tokens: &[&str],
    ) -> PktResult<()> {
        self.check_request(req)?;
        if success_tokens.is_empty() {
            error!("Empty success token table for [{}]", req.command);
            return Err(PktError::BadParameter);
        }
        let _request = self.request_lock.lock();
        self.ensure_active()?;
        let arming = Arming {
            extra_success_tokens: owned_tokens(success_tokens),
            ..Arming::default()
        };
        self.exchange(req, timeout, arming)
    }

    /// Send a command that is followed by raw payload bytes.
    ///
    /// The command is sent first, with `send_prefix` armed to repair the
    /// prompt in the receive stream. Only when the modem accepts the command
    /// are the payload and end pattern written, after which a second result
    /// is awaited. `data.sent_len` reports the payload bytes accepted.
    pub fn data_send(
        &self,
        req: &AtRequest,
        data: &mut DataSendRequest<'_>,
        send_prefix: Option<DataSendPrefixCallback>,
        timeouts: DataSendTimeouts,
    ) -> PktResult<()> {
        self.check_data_send(req, data)?;
        let _request = self.request_lock.lock();
        self.ensure_active()?;
        let arming = Arming {
            data_send_prefix: send_prefix,
            ..Arming::default()
        };
        self.exchange(req, timeouts.at, arming)?;
        self.send_data_phase(data, timeouts.data, timeouts.inter_delay)
    }

    /// [`PacketHandler::data_send`] with the configured default timeouts.
    pub fn request_data_send(&self, req: &AtRequest, data: &mut DataSendRequest<'_>) -> PktResult<()> {
        let timeouts = DataSendTimeouts::new(self.config().default_timeout(), self.config().data_send_timeout());
        self.data_send(req, data, None, timeouts)
    }

    /// [`PacketHandler::data_send`] without a prompt callback or inter-delay.
    pub fn data_send_with_timeout(
        &self,
        req: &AtRequest,
        data: &mut DataSendRequest<'_>,
        at_timeout: Duration,
        data_timeout: Duration,
    ) -> PktResult<()> {
        self.data_send(req, data, None, DataSendTimeouts::new(at_timeout, data_timeout))
    }

    /// [`PacketHandler::data_send`] accepting any of `success_tokens` as the
    /// command acknowledgement.
    pub fn data_send_success_token(
        &self,
        req: &AtRequest,
        data: &mut DataSendRequest<'_>,
        at_timeout: Duration,
        data_timeout: Duration,
        success_tokens: &[&str],
    ) -> PktResult<()> {
        self.check_data_send(req, data)?;
        if success_tokens.is_empty() {
            error!("Empty success token table for [{}]", req.command);
            return Err(PktError::BadParameter);
        }
        let _request = self.request_lock.lock();
        self.ensure_active()?;
        let arming = Arming {
            extra_success_tokens: owned_tokens(success_tokens),
            ..Arming::default()
        };
        self.exchange(req, at_timeout, arming)?;
        self.send_data_phase(data, data_timeout, Duration::ZERO)
    }

    fn check_request(&self, req: &AtRequest) -> PktResult<()> {
        self.ensure_active()?;
        if req.command.is_empty() {
            error!("Bad request: empty AT command");
            return Err(PktError::BadRequest);
        }
        Ok(())
    }

    fn check_data_send(&self, req: &AtRequest, data: &DataSendRequest<'_>) -> PktResult<()> {
        self.check_request(req)?;
        if data.data.is_empty() {
            error!("Bad request: no data to send after [{}]", req.command);
            return Err(PktError::BadRequest);
        }
        Ok(())
    }

    /// One command/response exchange. The caller holds the request lock.
    fn exchange(&self, req: &AtRequest, timeout: Duration, arming: Arming) -> PktResult<()> {
        metrics::counter!(metric_defs::REQUESTS_STARTED).increment(1);
        debug!(">>>>>Start sending [{}]<<<<<", req.command);

        let (responder, response) = bounded(1);
        {
            let mut slot = self.lock_slot();
            slot.command = Some(req.command.clone());
            slot.command_type = req.command_type;
            slot.response_prefix = req.response_prefix.clone();
            slot.callback = req.callback.clone();
            slot.data_prefix = arming.data_prefix;
            slot.data_send_prefix = arming.data_send_prefix;
            slot.extra_success_tokens = arming.extra_success_tokens;
            slot.responder = Some(responder);
        }

        let result = match self.transport().send_command(
            &req.command,
            req.command_type,
            req.response_prefix.as_deref(),
        ) {
            Ok(()) => self.wait_response(&response, timeout, &req.command),
            Err(e) => {
                warn!("Can't send [{}]: {}", req.command, e);
                Err(e)
            }
        };

        *self.lock_slot() = ArmedSlot::default();
        debug!("<<<<<Exit sending [{}] status[{:?}]>>>>>", req.command, result);
        result
    }

    /// Write the payload and wait for its result. The caller holds the
    /// request lock.
    fn send_data_phase(
        &self,
        data: &mut DataSendRequest<'_>,
        timeout: Duration,
        inter_delay: Duration,
    ) -> PktResult<()> {
        debug!(">>>>>Start sending {} data bytes<<<<<", data.data.len());

        let (responder, response) = bounded(1);
        {
            let mut slot = self.lock_slot();
            slot.command_type = AtCommandType::NoResult;
            slot.responder = Some(responder);
        }

        let result = self
            .write_payload(data, inter_delay)
            .and_then(|()| self.wait_response(&response, timeout, "data send"));

        *self.lock_slot() = ArmedSlot::default();
        if result.is_ok() {
            debug!("Data sent successfully");
        }
        result
    }

    fn write_payload(&self, data: &mut DataSendRequest<'_>, inter_delay: Duration) -> PktResult<()> {
        if !inter_delay.is_zero() {
            thread::sleep(inter_delay);
        }

        data.sent_len = self.transport().send_raw(data.data);
        if data.sent_len != data.data.len() {
            error!(
                "Incomplete data transfer: {} of {} bytes accepted",
                data.sent_len,
                data.data.len()
            );
            return Err(PktError::SendError);
        }

        if let Some(pattern) = data.end_pattern.filter(|p| !p.is_empty()) {
            let sent = self.transport().send_raw(pattern);
            if sent != pattern.len() {
                error!("Incomplete end pattern transfer: {} of {} bytes accepted", sent, pattern.len());
                return Err(PktError::SendError);
            }
        }
        Ok(())
    }

    fn wait_response(
        &self,
        response: &Receiver<PktResult<()>>,
        timeout: Duration,
        what: &str,
    ) -> PktResult<()> {
        match response.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("pkt_recv status={:?}, error in [{}] response", e, what);
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                metrics::counter!(metric_defs::REQUESTS_TIMED_OUT).increment(1);
                warn!("pkt_recv status={:?}, [{}] timed out after {:?}", PktError::TimedOut, what, timeout);
                Err(PktError::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => Err(PktError::Failure),
        }
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Deliver one classified packet from the receive thread. Never blocks.
    pub fn handle_packet(&self, packet: Packet<'_>) -> PktResult<()> {
        self.ensure_active()?;
        match packet {
            Packet::Solicited(response) => self.deliver_response(response),
            Packet::Unsolicited(line) => self.process_urc(line),
            Packet::Undefined(line) => self.process_undefined(line),
        }
    }

    fn deliver_response(&self, response: &AtResponse) -> PktResult<()> {
        let slot = self.lock_slot();
        let command = slot.command.as_deref().unwrap_or("NULL");

        let mut status = if response.status {
            Ok(())
        } else {
            error!("AT response for [{}] contains error", command);
            Err(PktError::Failure)
        };

        if status.is_ok() {
            if let Some(callback) = &slot.callback {
                status = callback(response);
            }
        }

        let posted = match &slot.responder {
            Some(responder) => match responder.try_send(status) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    error!("Got a response for [{}] when the response slot is full", command);
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    error!("Got a response for [{}] after the requester left", command);
                    false
                }
            },
            None => {
                error!("Got a response with no request waiting");
                false
            }
        };

        if posted {
            metrics::counter!(metric_defs::RESPONSES_DELIVERED).increment(1);
            status
        } else {
            metrics::counter!(metric_defs::RESPONSES_DROPPED).increment(1);
            Err(PktError::Failure)
        }
    }

    fn process_urc(&self, line: &str) -> PktResult<()> {
        if line.is_empty() {
            return Err(PktError::BadParameter);
        }
        let payload = duplicate(line).map_err(|e| {
            warn!("Couldn't copy URC of {} bytes: {}", line.len(), e);
            PktError::from(e)
        })?;
        trace!("Next URC token to parse [{}]", payload);

        let (token, remainder) = self.split_urc(&payload)?;
        match self.dispatch_urc(token, remainder) {
            Err(PktError::PrefixMismatch) => {
                self.generic_urc(&payload);
                Ok(())
            }
            other => other,
        }
    }

    /// Split `+TOKEN:rest` into `TOKEN` and `rest`.
    ///
    /// A line without a leading character is its own token and remainder; a
    /// line with a leading character but no colon has an empty remainder.
    fn split_urc<'a>(&self, line: &'a str) -> PktResult<(&'a str, &'a str)> {
        let Some(first) = line.chars().next() else {
            return Err(PktError::BadParameter);
        };
        if !self.config().prefix_leading_chars.contains(first) {
            return Ok((line, line));
        }

        let body = &line[first.len_utf8()..];
        let (token, remainder) = body.split_once(':').unwrap_or((body, ""));
        if token.is_empty() {
            error!("URC starts with {:?} but has no token: {}", first, line);
            return Err(PktError::BadRequest);
        }
        Ok((token, remainder))
    }

    /// Run the token map handler for `token`.
    ///
    /// Returns [`PktError::PrefixMismatch`] when the token is not in the map
    /// and [`PktError::Failure`] when it is mapped without a handler.
    pub fn dispatch_urc(&self, token: &str, remainder: &str) -> PktResult<()> {
        self.ensure_active()?;
        let Some(entry) = self.tokens().urc_map.lookup(token) else {
            return Err(PktError::PrefixMismatch);
        };

        match &entry.handler {
            Some(handler) => {
                metrics::counter!(metric_defs::URC_DISPATCHED).increment(1);
                handler(self, remainder);
                Ok(())
            }
            None => {
                warn!("No URC callback func avail {}", token);
                Err(PktError::Failure)
            }
        }
    }

    fn generic_urc(&self, line: &str) {
        metrics::counter!(metric_defs::URC_GENERIC).increment(1);
        match self.generic_urc_callback() {
            Some(callback) => callback(line),
            None => debug!("No handler for URC [{}]", line),
        }
    }

    fn process_undefined(&self, line: &str) -> PktResult<()> {
        if line.is_empty() {
            return Err(PktError::BadParameter);
        }
        match self.undefined_resp_callback() {
            Some(callback) => callback(line).map_err(|e| {
                warn!("Undefined response [{}] not recognized: {}", line, e);
                PktError::InvalidData
            }),
            None => {
                warn!("Undefined response [{}] with no callback registered", line);
                Err(PktError::InvalidData)
            }
        }
    }
}
