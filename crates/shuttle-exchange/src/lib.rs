//! Exchange-file channel and registry dispatch.
//!
//! One request/reply round trip: the channel opens the exchange file the
//! invoker wrote, the dispatcher decodes the request and runs the matching
//! toolkit operation, and the channel overwrites the file with the reply
//! envelope. Channel faults are fatal and carry process exit codes; once the
//! request is readable, every further fault is reported through the envelope
//! instead.

mod channel;
mod dispatch;
mod normalize;

pub use channel::{ChannelError, ExchangeChannel};
pub use dispatch::Dispatcher;
