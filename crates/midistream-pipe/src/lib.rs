//! Pipe channels connecting the host to a MIDI driver's event rings.
//!
//! The driver owns the storage. This crate only consumes it through the
//! [`PipeTransport`] contract: check for pending data, pop short or long
//! events, and let the transport wrap its read head. [`LocalPipeHub`] is an
//! in-process implementation of that contract used by tests and the demo
//! host.

pub mod channel;
pub mod error;
pub mod local;
pub mod transport;

pub use channel::{PipeChannel, PipeState};
pub use error::TransportError;
pub use local::{
    LocalPipeHub, LocalTransport, PipeProducer, DEFAULT_CAPACITY, MAX_CAPACITY,
    MAX_LONG_EVENT_BYTES, MAX_LONG_SLOTS, MIN_CAPACITY,
};
pub use transport::{PipeId, PipeTransport, TransportConnector, MAX_PIPES};
