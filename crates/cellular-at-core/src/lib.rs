//! Cellular Modem AT Response Core
//!
//! This crate provides the text-level building blocks shared by every cellular
//! modem driver: bounded string helpers for picking AT response lines apart,
//! the [`AtCommandType`] and [`AtResponse`] data model, and a [`LineCodec`]
//! that turns the raw serial byte stream into lines.
//!
//! # Protocol Overview
//!
//! AT traffic is a half-duplex, line-based text exchange:
//!
//! - **Commands** (host → modem): `AT...` text terminated with `\r`
//! - **Intermediate lines** (modem → host): zero or more lines, usually
//!   shaped `+TOKEN: field,field,...`
//! - **Final result code**: `OK`, `ERROR`, `+CME ERROR: <n>` and similar
//! - **URCs**: unsolicited `+TOKEN: ...` lines that may arrive at any time
//!
//! Fields are comma separated; positional fields may be empty and string
//! fields are usually double-quoted.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellular_at_core::{is_prefix_present, next_token, remove_prefix, LineCodec};
//!
//! let mut codec = LineCodec::new();
//! codec.push(b"+CEREG: 1,5\r\n")?;
//! let line = codec.decode_line().unwrap();
//! assert!(is_prefix_present(&line)?);
//! let mut cursor = remove_prefix(&line)?.trim_start();
//! let mode = next_token(&mut cursor)?;
//! ```

mod codec;
mod error;
mod response;
mod text;

pub use codec::*;
pub use error::*;
pub use response::*;
pub use text::*;
