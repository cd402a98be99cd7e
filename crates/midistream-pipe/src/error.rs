use thiserror::Error;

/// Errors reported by pipe transports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Pipe ordinal outside `0..MAX_PIPES`.
    #[error("pipe {0} is out of range")]
    InvalidPipe(u8),
    /// The other end of the pipe is already claimed.
    #[error("pipe is already in use")]
    Busy,
    /// The pipe has not been created, or the channel is not open.
    #[error("pipe is not available")]
    Unavailable,
    /// The event ring has no free slot.
    #[error("event ring is full")]
    Full,
    /// The consumer closed the pipe.
    #[error("pipe was closed by the consumer")]
    Disconnected,
    #[error("long event of {len} bytes cannot be queued")]
    InvalidLongEvent { len: usize },
    /// Transient read failure; callers treat it as "no data".
    #[error("pipe read failed: {0}")]
    Read(String),
}
