use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{PipeId, PipeTransport, TransportConnector};

/// Lifecycle of a [`PipeChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipeState {
    #[default]
    Unopened,
    Open,
    Draining,
    Closing,
    Closed,
}

impl PipeState {
    pub fn encode(self) -> u8 {
        match self {
            PipeState::Unopened => 0,
            PipeState::Open => 1,
            PipeState::Draining => 2,
            PipeState::Closing => 3,
            PipeState::Closed => 4,
        }
    }

    pub fn decode(value: u8) -> Self {
        match value {
            1 => PipeState::Open,
            2 => PipeState::Draining,
            3 => PipeState::Closing,
            4 => PipeState::Closed,
            _ => PipeState::Unopened,
        }
    }
}

/// One stream's connection to the driver.
///
/// Calls made while the channel is not open never reach a transport: they
/// report no data, or [`TransportError::Unavailable`] for fetches.
pub struct PipeChannel {
    id: PipeId,
    transport: Option<Box<dyn PipeTransport>>,
    state: PipeState,
}

impl std::fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeChannel")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PipeChannel {
    pub fn new(id: PipeId) -> Self {
        Self {
            id,
            transport: None,
            state: PipeState::Unopened,
        }
    }

    /// Creates and opens a channel in one step.
    pub fn connect(
        connector: &dyn TransportConnector,
        id: PipeId,
        capacity_hint: usize,
    ) -> Result<Self, TransportError> {
        let mut channel = Self::new(id);
        channel.open(connector, capacity_hint)?;
        Ok(channel)
    }

    pub fn open(
        &mut self,
        connector: &dyn TransportConnector,
        capacity_hint: usize,
    ) -> Result<(), TransportError> {
        if self.transport.is_some() {
            return Err(TransportError::Busy);
        }
        let transport = connector.connect(self.id, capacity_hint)?;
        self.transport = Some(transport);
        self.state = PipeState::Open;
        info!(pipe = %self.id, capacity_hint, "pipe channel opened");
        Ok(())
    }

    pub fn id(&self) -> PipeId {
        self.id
    }

    pub fn state(&self) -> PipeState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn has_pending_data(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.has_pending_data())
    }

    /// Pops one short event. Only call after [`has_pending_data`](Self::has_pending_data)
    /// returned true.
    pub fn fetch_short_event(&mut self) -> Result<u32, TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport.fetch_short_event(),
            None => Err(TransportError::Unavailable),
        }
    }

    pub fn fetch_long_event(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport.fetch_long_event(buffer),
            None => Ok(0),
        }
    }

    pub fn reset_read_head_if_needed(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.reset_read_head_if_needed();
        }
    }

    pub fn read_head_position(&self) -> i32 {
        self.transport
            .as_ref()
            .map_or(0, |transport| transport.read_head())
    }

    pub fn write_head_position(&self) -> i32 {
        self.transport
            .as_ref()
            .map_or(0, |transport| transport.write_head())
    }

    pub fn begin_drain(&mut self) {
        if self.state == PipeState::Open {
            self.state = PipeState::Draining;
        }
    }

    pub fn end_drain(&mut self) {
        if self.state == PipeState::Draining {
            self.state = PipeState::Open;
        }
    }

    /// Releases the transport. Safe to call any number of times.
    pub fn close(&mut self) {
        match self.transport.take() {
            Some(mut transport) => {
                self.state = PipeState::Closing;
                transport.close();
                self.state = PipeState::Closed;
                debug!(pipe = %self.id, "pipe channel closed");
            }
            None => {
                if self.state == PipeState::Unopened {
                    warn!(pipe = %self.id, "close called on a pipe that was never opened");
                }
                self.state = PipeState::Closed;
            }
        }
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        if self.transport.is_some() {
            self.close();
        }
    }
}
