//! Cellular Modem Packet Handler
//!
//! This crate correlates AT requests with modem responses and routes
//! unsolicited result codes (URCs) to their handlers.
//!
//! # Overview
//!
//! A [`PacketHandler`] sits between two threads:
//!
//! - **Requesters** call [`PacketHandler::request`] and friends. Requests are
//!   serialized so at most one command is in flight; the caller blocks until
//!   the response arrives or the timeout fires.
//! - **The receive thread** runs a [`LineProcessor`] (usually through
//!   [`spawn_reader`]) that classifies incoming lines and calls
//!   [`PacketHandler::handle_packet`] for each complete unit.
//!
//! URCs are dispatched through a sorted [`TokenMap`]; unmapped URCs go to
//! the generic callback.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cellular_pkthandler::*;
//!
//! let map = TokenMap::new(vec![
//!     TokenMapEntry::new("CEREG", |_ctx: &PacketHandler, rest: &str| println!("reg {rest}")),
//!     TokenMapEntry::unhandled("QIURC"),
//! ]);
//! let handler = Arc::new(PacketHandler::new(
//!     Arc::new(LineTransport::new(port_writer)),
//!     TokenTable::new(map),
//!     PktHandlerConfig::load("modem.yaml")?,
//! ));
//! handler.validate_token_map()?;
//! handler.init()?;
//! let reader = spawn_reader(Arc::clone(&handler), rx_bytes)?;
//!
//! let req = AtRequest::new("AT+CSQ", AtCommandType::WithPrefix)
//!     .with_prefix("+CSQ")
//!     .with_callback(|resp| {
//!         println!("{:?}", resp.first_line());
//!         Ok(())
//!     });
//! handler.request(&req)?;
//! ```

mod config;
mod context;
mod error;
pub mod metric_defs;
mod pkthandler;
mod processor;
mod request;
mod token_map;
mod token_table;
mod transport;

pub use cellular_at_core::{AtCommandType, AtResponse};
pub use config::*;
pub use context::PacketHandler;
pub use error::*;
pub use pkthandler::*;
pub use processor::*;
pub use request::*;
pub use token_map::*;
pub use token_table::*;
pub use transport::*;
