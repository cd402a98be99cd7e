#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use midistream_host::{SinkError, SynthSink};
use midistream_pipe::{PipeId, PipeTransport, TransportConnector, TransportError};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    NoteOn(u8, u8, u8),
    NoteOff(u8, u8, u8),
    PolyAftertouch(u8, u8, u8),
    ChannelPressure(u8, u8),
    ProgramChange(u8, u8),
    Raw3([u8; 3]),
    Long(Vec<u8>),
}

/// Records everything it is handed, per pipe.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<HashMap<PipeId, Vec<Received>>>,
    opened: Mutex<Vec<PipeId>>,
    released: Mutex<Vec<PipeId>>,
    /// Note-on keys that fail fatally.
    fatal_keys: Vec<u8>,
    /// Note-on keys that panic.
    panic_keys: Vec<u8>,
    /// Pipes whose `open_stream` fails.
    refuse: Vec<PipeId>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(key: u8) -> Arc<Self> {
        Arc::new(Self {
            fatal_keys: vec![key],
            ..Self::default()
        })
    }

    pub fn panicking_on(key: u8) -> Arc<Self> {
        Arc::new(Self {
            panic_keys: vec![key],
            ..Self::default()
        })
    }

    pub fn refusing(pipe: PipeId) -> Arc<Self> {
        Arc::new(Self {
            refuse: vec![pipe],
            ..Self::default()
        })
    }

    pub fn events(&self, pipe: PipeId) -> Vec<Received> {
        self.events.lock().get(&pipe).cloned().unwrap_or_default()
    }

    pub fn opened(&self) -> Vec<PipeId> {
        self.opened.lock().clone()
    }

    pub fn released(&self) -> Vec<PipeId> {
        let mut released = self.released.lock().clone();
        released.sort();
        released
    }

    fn record(&self, pipe: PipeId, event: Received) -> Result<(), SinkError> {
        self.events.lock().entry(pipe).or_default().push(event);
        Ok(())
    }
}

impl SynthSink for RecordingSink {
    fn open_stream(&self, pipe: PipeId) -> Result<(), SinkError> {
        if self.refuse.contains(&pipe) {
            return Err(SinkError::Fatal(format!("{pipe} refused")));
        }
        self.opened.lock().push(pipe);
        Ok(())
    }

    fn release_stream(&self, pipe: PipeId) {
        self.released.lock().push(pipe);
    }

    fn dispatch_note_on(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError> {
        if self.panic_keys.contains(&key) {
            panic!("synth blew up on key {key}");
        }
        if self.fatal_keys.contains(&key) {
            return Err(SinkError::Fatal(format!("key {key} lost the voice bank")));
        }
        self.record(pipe, Received::NoteOn(channel, key, velocity))
    }

    fn dispatch_note_off(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError> {
        self.record(pipe, Received::NoteOff(channel, key, velocity))
    }

    fn dispatch_poly_aftertouch(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        pressure: u8,
    ) -> Result<(), SinkError> {
        self.record(pipe, Received::PolyAftertouch(channel, key, pressure))
    }

    fn dispatch_channel_pressure(
        &self,
        pipe: PipeId,
        channel: u8,
        pressure: u8,
    ) -> Result<(), SinkError> {
        self.record(pipe, Received::ChannelPressure(channel, pressure))
    }

    fn dispatch_program_change(
        &self,
        pipe: PipeId,
        channel: u8,
        program: u8,
    ) -> Result<(), SinkError> {
        self.record(pipe, Received::ProgramChange(channel, program))
    }

    fn dispatch_raw3(&self, pipe: PipeId, bytes: [u8; 3]) -> Result<(), SinkError> {
        self.record(pipe, Received::Raw3(bytes))
    }

    fn dispatch_long(&self, pipe: PipeId, bytes: &[u8]) -> Result<(), SinkError> {
        self.record(pipe, Received::Long(bytes.to_vec()))
    }
}

/// Wraps a connector and refuses to open selected pipes.
pub struct RefusingConnector<C> {
    pub inner: C,
    pub refuse: Vec<PipeId>,
}

impl<C: TransportConnector> TransportConnector for RefusingConnector<C> {
    fn connect(
        &self,
        id: PipeId,
        capacity_hint: usize,
    ) -> Result<Box<dyn PipeTransport>, TransportError> {
        if self.refuse.contains(&id) {
            return Err(TransportError::Unavailable);
        }
        self.inner.connect(id, capacity_hint)
    }
}

pub fn pipe(index: u8) -> PipeId {
    PipeId::new(index).unwrap()
}

/// Packs a short event the way the driver writes it.
pub fn pack(status: u8, param1: u8, param2: u8) -> u32 {
    u32::from(status) | u32::from(param1) << 8 | u32::from(param2) << 16
}

/// Packs a running-status event: data bytes only.
pub fn pack_running(param1: u8, param2: u8) -> u32 {
    u32::from(param1) | u32::from(param2) << 8
}
