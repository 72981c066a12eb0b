//! Metric names emitted by the packet handler.
//!
//! Counters go through the [`metrics`] facade and cost nothing until the
//! application installs a recorder. Call [`describe_metrics`] once at
//! startup to register descriptions with that recorder.

use metrics::{describe_counter, Unit};

/// AT requests handed to the transport.
pub const REQUESTS_STARTED: &str = "cellular.pkthandler.requests_started";

/// Requests that gave up waiting for the modem.
pub const REQUESTS_TIMED_OUT: &str = "cellular.pkthandler.requests_timed_out";

/// Solicited responses posted to a waiting requester.
pub const RESPONSES_DELIVERED: &str = "cellular.pkthandler.responses_delivered";

/// Solicited responses that arrived with nobody waiting.
pub const RESPONSES_DROPPED: &str = "cellular.pkthandler.responses_dropped";

/// URCs handled by a token map entry.
pub const URC_DISPATCHED: &str = "cellular.pkthandler.urc_dispatched";

/// URCs passed to the generic fallback.
pub const URC_GENERIC: &str = "cellular.pkthandler.urc_generic";

/// Register descriptions for every packet handler metric.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_STARTED, Unit::Count, "AT requests handed to the transport");
    describe_counter!(REQUESTS_TIMED_OUT, Unit::Count, "AT requests that timed out waiting for the modem");
    describe_counter!(RESPONSES_DELIVERED, Unit::Count, "Solicited responses posted to a waiting requester");
    describe_counter!(RESPONSES_DROPPED, Unit::Count, "Solicited responses that arrived with no request waiting");
    describe_counter!(URC_DISPATCHED, Unit::Count, "URCs handled by a token map entry");
    describe_counter!(URC_GENERIC, Unit::Count, "URCs passed to the generic fallback");
}
