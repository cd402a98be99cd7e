use std::path::PathBuf;

use midistream_pipe::{PipeId, TransportError};
use thiserror::Error;

use crate::sink::SinkError;

/// Errors returned by [`StreamMultiplexer`](crate::StreamMultiplexer) calls.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("streams are already running")]
    AlreadyStarted,
    #[error("{requested} channels requested, at most {max} are supported")]
    TooManyChannels { requested: usize, max: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A failure that stopped, or never started, a single stream. Sibling
/// streams keep running.
#[derive(Debug, Clone, Error)]
pub enum StreamFault {
    #[error("{pipe}: transport failed to open: {source}")]
    Open {
        pipe: PipeId,
        #[source]
        source: TransportError,
    },
    #[error("{pipe}: synthesis sink failed: {source}")]
    Sink {
        pipe: PipeId,
        #[source]
        source: SinkError,
    },
    #[error("{pipe}: failed to spawn worker: {message}")]
    Spawn { pipe: PipeId, message: String },
    #[error("{pipe}: worker panicked: {message}")]
    Panicked { pipe: PipeId, message: String },
}

impl StreamFault {
    pub fn pipe(&self) -> PipeId {
        match self {
            StreamFault::Open { pipe, .. }
            | StreamFault::Sink { pipe, .. }
            | StreamFault::Spawn { pipe, .. }
            | StreamFault::Panicked { pipe, .. } => *pipe,
        }
    }
}
