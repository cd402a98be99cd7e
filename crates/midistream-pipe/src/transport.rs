use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;

/// Maximum number of independent pipes a driver exposes.
pub const MAX_PIPES: usize = 4;

/// Ordinal of one pipe, always below [`MAX_PIPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipeId(u8);

impl PipeId {
    pub fn new(index: u8) -> Result<Self, TransportError> {
        if usize::from(index) < MAX_PIPES {
            Ok(Self(index))
        } else {
            Err(TransportError::InvalidPipe(index))
        }
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The first `count` pipe ids, capped at [`MAX_PIPES`].
    pub fn first(count: usize) -> impl Iterator<Item = PipeId> {
        (0..count.min(MAX_PIPES)).map(|index| PipeId(index as u8))
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe{}", self.0)
    }
}

/// Consumer side of one pipe as exposed by the driver.
///
/// Callers must check [`has_pending_data`](Self::has_pending_data) before
/// every short event fetch and call
/// [`reset_read_head_if_needed`](Self::reset_read_head_if_needed) after each
/// one. The transport is the only thing that moves the read head.
pub trait PipeTransport: Send {
    fn has_pending_data(&self) -> bool;

    /// Pops one packed short event.
    fn fetch_short_event(&mut self) -> Result<u32, TransportError>;

    /// Pops at most one long event into `buffer` and returns its length,
    /// 0 when none is pending.
    fn fetch_long_event(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;

    /// Lets the transport wrap its read head at the end of the ring.
    fn reset_read_head_if_needed(&mut self);

    fn read_head(&self) -> i32;

    fn write_head(&self) -> i32;

    /// Releases the underlying handle. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Opens pipe transports by id.
pub trait TransportConnector: Send + Sync {
    /// `capacity_hint` is passed on to the producer; the actual ring size
    /// may differ.
    fn connect(
        &self,
        id: PipeId,
        capacity_hint: usize,
    ) -> Result<Box<dyn PipeTransport>, TransportError>;
}

impl<T: TransportConnector + ?Sized> TransportConnector for Arc<T> {
    fn connect(
        &self,
        id: PipeId,
        capacity_hint: usize,
    ) -> Result<Box<dyn PipeTransport>, TransportError> {
        (**self).connect(id, capacity_hint)
    }
}
