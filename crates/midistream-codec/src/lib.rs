//! Decoding of MIDI events read from a driver pipe.
//!
//! Short events arrive as a packed little-endian `u32` (status, data1, data2,
//! reserved). The status byte may be omitted when it matches the previous one
//! (running status), in which case the caller threads the last seen status
//! through [`decode_short`]. Long events are opaque byte blobs that are only
//! wrapped, never interpreted.

#![cfg_attr(not(test), warn(clippy::pedantic))]

pub mod event;
pub mod status;

pub use event::{MidiEvent, ShortEvent};

/// Decodes a packed short event.
///
/// Returns the decoded event (or `None` when the event type is not one the
/// synthesis path handles) together with the running status to use for the
/// next call.
#[inline]
#[must_use]
pub fn decode_short(raw: u32, prior_status: u8) -> (Option<MidiEvent<'static>>, u8) {
    let short = ShortEvent::resolve(raw, prior_status);
    (short.to_event(), short.status())
}

/// Wraps a long event fetched from the pipe. An empty buffer yields no event.
#[inline]
#[must_use]
pub fn decode_long(bytes: &[u8]) -> Option<MidiEvent<'_>> {
    if bytes.is_empty() {
        None
    } else {
        Some(MidiEvent::Long(bytes))
    }
}

/// Running status state for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningStatus(u8);

impl RunningStatus {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Last real status byte seen on the stream (0 before the first one).
    #[must_use]
    pub const fn last(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn decode(&mut self, raw: u32) -> Option<MidiEvent<'static>> {
        let (event, status) = decode_short(raw, self.0);
        self.0 = status;
        event
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
