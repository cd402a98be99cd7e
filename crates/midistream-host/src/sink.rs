use midistream_codec::MidiEvent;
use midistream_pipe::PipeId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The event was dropped; the stream keeps going.
    #[error("event rejected: {0}")]
    Rejected(String),
    /// The sink can no longer serve this stream.
    #[error("fatal sink error: {0}")]
    Fatal(String),
}

impl SinkError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::Fatal(_))
    }
}

/// Synthesis backend receiving decoded events.
///
/// One sink is shared by every stream worker, so implementations must accept
/// calls from several threads at once. Calls for a single pipe always arrive
/// from one thread, in pipe order.
pub trait SynthSink: Send + Sync {
    /// Called before the worker for `pipe` starts.
    fn open_stream(&self, _pipe: PipeId) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once after the worker for `pipe` has exited.
    fn release_stream(&self, _pipe: PipeId) {}

    fn dispatch_note_on(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError>;

    fn dispatch_note_off(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError>;

    fn dispatch_poly_aftertouch(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        pressure: u8,
    ) -> Result<(), SinkError>;

    fn dispatch_channel_pressure(
        &self,
        pipe: PipeId,
        channel: u8,
        pressure: u8,
    ) -> Result<(), SinkError>;

    fn dispatch_program_change(
        &self,
        pipe: PipeId,
        channel: u8,
        program: u8,
    ) -> Result<(), SinkError>;

    /// Control change and pitch bend, status byte first.
    fn dispatch_raw3(&self, pipe: PipeId, bytes: [u8; 3]) -> Result<(), SinkError>;

    fn dispatch_long(&self, pipe: PipeId, bytes: &[u8]) -> Result<(), SinkError>;

    /// Voices currently sounding for `pipe`, if the sink tracks them.
    fn active_voices(&self, _pipe: PipeId) -> u32 {
        0
    }

    fn dispatch(&self, pipe: PipeId, event: MidiEvent<'_>) -> Result<(), SinkError> {
        match event {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => self.dispatch_note_on(pipe, channel, key, velocity),
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => self.dispatch_note_off(pipe, channel, key, velocity),
            MidiEvent::PolyAftertouch {
                channel,
                key,
                pressure,
            } => self.dispatch_poly_aftertouch(pipe, channel, key, pressure),
            MidiEvent::ChannelPressure { channel, pressure } => {
                self.dispatch_channel_pressure(pipe, channel, pressure)
            }
            MidiEvent::ProgramChange { channel, program } => {
                self.dispatch_program_change(pipe, channel, program)
            }
            MidiEvent::ControlChange { raw, .. } | MidiEvent::PitchBend { raw, .. } => {
                self.dispatch_raw3(pipe, raw)
            }
            MidiEvent::Long(bytes) => self.dispatch_long(pipe, bytes),
        }
    }
}
