//! Sink that hands decoded events to a render thread through lock-free queues.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam_queue::ArrayQueue;
use midistream_pipe::{PipeId, MAX_PIPES};

use crate::sink::{SinkError, SynthSink};

/// Owned form of a decoded event, as queued for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthCommand {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    PolyAftertouch { channel: u8, key: u8, pressure: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    ProgramChange { channel: u8, program: u8 },
    Raw3([u8; 3]),
    Long(Vec<u8>),
}

struct StreamQueue {
    queue: ArrayQueue<SynthCommand>,
    voices: AtomicU32,
    open: AtomicBool,
}

impl StreamQueue {
    fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            voices: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    fn voice_started(&self) {
        self.voices.fetch_add(1, Ordering::Relaxed);
    }

    fn voice_ended(&self) {
        let _ = self
            .voices
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |voices| {
                voices.checked_sub(1)
            });
    }
}

/// One bounded queue per pipe. A full queue rejects the event rather than
/// blocking the stream worker.
pub struct QueueSink {
    streams: Vec<StreamQueue>,
}

impl std::fmt::Debug for QueueSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSink")
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

impl QueueSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            streams: (0..MAX_PIPES).map(|_| StreamQueue::new(capacity)).collect(),
        }
    }

    pub fn pop(&self, pipe: PipeId) -> Option<SynthCommand> {
        self.streams[pipe.index()].queue.pop()
    }

    /// Moves every queued command for `pipe` into `out`.
    pub fn drain(&self, pipe: PipeId, out: &mut Vec<SynthCommand>) -> usize {
        let queue = &self.streams[pipe.index()].queue;
        let before = out.len();
        while let Some(command) = queue.pop() {
            out.push(command);
        }
        out.len() - before
    }

    pub fn is_open(&self, pipe: PipeId) -> bool {
        self.streams[pipe.index()].open.load(Ordering::Acquire)
    }

    fn push(&self, pipe: PipeId, command: SynthCommand) -> Result<(), SinkError> {
        let stream = &self.streams[pipe.index()];
        if !stream.open.load(Ordering::Acquire) {
            return Err(SinkError::Rejected(format!("{pipe} is not open")));
        }
        stream
            .queue
            .push(command)
            .map_err(|_| SinkError::Rejected(format!("{pipe} queue is full")))
    }
}

impl SynthSink for QueueSink {
    fn open_stream(&self, pipe: PipeId) -> Result<(), SinkError> {
        let stream = &self.streams[pipe.index()];
        if stream.open.swap(true, Ordering::AcqRel) {
            return Err(SinkError::Fatal(format!("{pipe} is already open")));
        }
        Ok(())
    }

    fn release_stream(&self, pipe: PipeId) {
        let stream = &self.streams[pipe.index()];
        stream.open.store(false, Ordering::Release);
        while stream.queue.pop().is_some() {}
        stream.voices.store(0, Ordering::Relaxed);
    }

    fn dispatch_note_on(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError> {
        self.push(
            pipe,
            SynthCommand::NoteOn {
                channel,
                key,
                velocity,
            },
        )?;
        let stream = &self.streams[pipe.index()];
        if velocity > 0 {
            stream.voice_started();
        } else {
            stream.voice_ended();
        }
        Ok(())
    }

    fn dispatch_note_off(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SinkError> {
        self.push(
            pipe,
            SynthCommand::NoteOff {
                channel,
                key,
                velocity,
            },
        )?;
        self.streams[pipe.index()].voice_ended();
        Ok(())
    }

    fn dispatch_poly_aftertouch(
        &self,
        pipe: PipeId,
        channel: u8,
        key: u8,
        pressure: u8,
    ) -> Result<(), SinkError> {
        self.push(
            pipe,
            SynthCommand::PolyAftertouch {
                channel,
                key,
                pressure,
            },
        )
    }

    fn dispatch_channel_pressure(
        &self,
        pipe: PipeId,
        channel: u8,
        pressure: u8,
    ) -> Result<(), SinkError> {
        self.push(pipe, SynthCommand::ChannelPressure { channel, pressure })
    }

    fn dispatch_program_change(
        &self,
        pipe: PipeId,
        channel: u8,
        program: u8,
    ) -> Result<(), SinkError> {
        self.push(pipe, SynthCommand::ProgramChange { channel, program })
    }

    fn dispatch_raw3(&self, pipe: PipeId, bytes: [u8; 3]) -> Result<(), SinkError> {
        self.push(pipe, SynthCommand::Raw3(bytes))
    }

    fn dispatch_long(&self, pipe: PipeId, bytes: &[u8]) -> Result<(), SinkError> {
        self.push(pipe, SynthCommand::Long(bytes.to_vec()))
    }

    fn active_voices(&self, pipe: PipeId) -> u32 {
        self.streams[pipe.index()].voices.load(Ordering::Relaxed)
    }
}
