use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering};

use midistream_pipe::{PipeId, PipeState};

/// Counters a worker publishes for observers on other threads.
#[derive(Debug, Default)]
pub struct StreamStatus {
    state: AtomicU8,
    read_head: AtomicI32,
    write_head: AtomicI32,
    short_events: AtomicU64,
    long_events: AtomicU64,
    skipped_events: AtomicU64,
    dispatch_errors: AtomicU64,
    drain_cycles: AtomicU64,
}

impl StreamStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: PipeState) {
        self.state.store(state.encode(), Ordering::Release);
    }

    pub fn state(&self) -> PipeState {
        PipeState::decode(self.state.load(Ordering::Acquire))
    }

    pub fn update_heads(&self, read_head: i32, write_head: i32) {
        self.read_head.store(read_head, Ordering::Relaxed);
        self.write_head.store(write_head, Ordering::Relaxed);
    }

    pub(crate) fn add_short_event(&self) {
        self.short_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_long_event(&self) {
        self.long_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_skipped_event(&self) {
        self.skipped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_dispatch_error(&self) {
        self.dispatch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_drain_cycle(&self) {
        self.drain_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pipe: PipeId, active_voices: u32) -> StreamSnapshot {
        StreamSnapshot {
            pipe,
            state: self.state(),
            read_head: self.read_head.load(Ordering::Relaxed),
            write_head: self.write_head.load(Ordering::Relaxed),
            short_events: self.short_events.load(Ordering::Relaxed),
            long_events: self.long_events.load(Ordering::Relaxed),
            skipped_events: self.skipped_events.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
            active_voices,
        }
    }
}

/// Point-in-time view of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub pipe: PipeId,
    pub state: PipeState,
    pub read_head: i32,
    pub write_head: i32,
    /// Short events handed to the sink.
    pub short_events: u64,
    /// Long events handed to the sink.
    pub long_events: u64,
    /// Short events with an event type the sink does not take.
    pub skipped_events: u64,
    /// Events the sink rejected without stopping the stream.
    pub dispatch_errors: u64,
    pub drain_cycles: u64,
    pub active_voices: u32,
}
