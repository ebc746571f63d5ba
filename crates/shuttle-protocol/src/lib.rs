//! Wire types for the toolkit exchange protocol.
//!
//! A caller writes a single JSON request object into an exchange file. The
//! object names a command through its `wrapperName` field and carries the
//! command's arguments alongside it. The dispatcher replies by truncating the
//! same file and writing a JSON response envelope in its place.
//!
//! This crate defines both halves of that conversation: the command registry
//! and its typed argument payloads on the way in, and the response envelope
//! with its typed result payloads on the way out. Faults that are reported to
//! the caller (rather than aborting the exchange) are modelled by
//! [`fault::Fault`].

pub mod command;
pub mod fault;
pub mod request;
pub mod response;

pub use command::{Command, CommandName};
pub use fault::{Fault, FaultKind};
pub use response::ExchangeReply;
