//! Host side of the driver pipe protocol.
//!
//! A [`StreamMultiplexer`] opens up to four [`PipeChannel`]s and runs one
//! [`StreamWorker`] thread per channel. Each worker polls its pipe, decodes
//! everything written since the start of the cycle and hands the events to a
//! shared [`SynthSink`].
//!
//! [`PipeChannel`]: midistream_pipe::PipeChannel

pub mod config;
pub mod error;
pub mod multiplexer;
pub mod queue_sink;
pub mod sink;
pub mod status;
pub mod stop;
pub mod worker;

pub use config::HostConfig;
pub use error::{ConfigError, HostError, StreamFault};
pub use multiplexer::{StopReport, StreamMultiplexer};
pub use queue_sink::{QueueSink, SynthCommand};
pub use sink::{SinkError, SynthSink};
pub use status::{StreamSnapshot, StreamStatus};
pub use stop::StopToken;
pub use worker::{StreamWorker, WorkerReport, WorkerSettings};
