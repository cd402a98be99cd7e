use crate::status;

/// A decoded MIDI event ready for a synthesis sink.
///
/// Control change and pitch bend keep their raw bytes: the MSB/LSB pairing is
/// left to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent<'a> {
    NoteOff {
        channel: u8,
        key: u8,
        velocity: u8,
    },
    NoteOn {
        channel: u8,
        key: u8,
        velocity: u8,
    },
    PolyAftertouch {
        channel: u8,
        key: u8,
        pressure: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    ControlChange {
        channel: u8,
        raw: [u8; 3],
    },
    PitchBend {
        channel: u8,
        raw: [u8; 3],
    },
    /// System exclusive or other raw data, forwarded byte for byte.
    Long(&'a [u8]),
}

impl MidiEvent<'_> {
    /// MIDI channel (0-15) for channel voice events.
    #[must_use]
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiEvent::NoteOff { channel, .. }
            | MidiEvent::NoteOn { channel, .. }
            | MidiEvent::PolyAftertouch { channel, .. }
            | MidiEvent::ProgramChange { channel, .. }
            | MidiEvent::ChannelPressure { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => Some(channel),
            MidiEvent::Long(_) => None,
        }
    }

    /// Renders a channel voice event back to wire bytes.
    ///
    /// Returns the bytes and the number of them that are meaningful, or
    /// `None` for long events.
    #[must_use]
    pub fn to_short_bytes(&self) -> Option<([u8; 3], usize)> {
        let bytes = match *self {
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => ([status::NOTE_OFF | channel, key, velocity], 3),
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => ([status::NOTE_ON | channel, key, velocity], 3),
            MidiEvent::PolyAftertouch {
                channel,
                key,
                pressure,
            } => ([status::POLY_AFTERTOUCH | channel, key, pressure], 3),
            MidiEvent::ProgramChange { channel, program } => {
                ([status::PROGRAM_CHANGE | channel, program, 0], 2)
            }
            MidiEvent::ChannelPressure { channel, pressure } => {
                ([status::CHANNEL_PRESSURE | channel, pressure, 0], 2)
            }
            MidiEvent::ControlChange { raw, .. } | MidiEvent::PitchBend { raw, .. } => (raw, 3),
            MidiEvent::Long(_) => return None,
        };
        Some(bytes)
    }
}

/// A short event after running status has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortEvent {
    word: u32,
    status: u8,
}

impl ShortEvent {
    /// Applies running status to a packed word read from the pipe.
    #[inline]
    #[must_use]
    pub const fn resolve(raw: u32, prior_status: u8) -> Self {
        let first = raw.to_le_bytes()[0];
        if status::is_status(first) {
            Self {
                word: raw,
                status: first,
            }
        } else {
            Self {
                word: (raw << 8) | u32::from_le_bytes([prior_status, 0, 0, 0]),
                status: prior_status,
            }
        }
    }

    /// Packed word with the status byte in bits 0-7.
    #[must_use]
    pub const fn word(&self) -> u32 {
        self.word
    }

    #[must_use]
    pub const fn status(&self) -> u8 {
        self.status
    }

    #[must_use]
    pub const fn event_type(&self) -> u8 {
        status::event_type(self.status)
    }

    #[must_use]
    pub const fn channel(&self) -> u8 {
        status::channel(self.status)
    }

    /// Bits 8-15.
    #[must_use]
    pub const fn param1(&self) -> u8 {
        self.word.to_le_bytes()[1]
    }

    /// Bits 16-23.
    #[must_use]
    pub const fn param2(&self) -> u8 {
        self.word.to_le_bytes()[2]
    }

    /// Bits 24-31. Carried by some drivers, never used for decoding.
    #[must_use]
    pub const fn reserved(&self) -> u8 {
        self.word.to_le_bytes()[3]
    }

    #[inline]
    #[must_use]
    pub fn to_event(&self) -> Option<MidiEvent<'static>> {
        let channel = self.channel();
        let (p1, p2) = (self.param1(), self.param2());
        let event = match self.event_type() {
            status::NOTE_OFF => MidiEvent::NoteOff {
                channel,
                key: p1,
                velocity: p2,
            },
            status::NOTE_ON => MidiEvent::NoteOn {
                channel,
                key: p1,
                velocity: p2,
            },
            status::POLY_AFTERTOUCH => MidiEvent::PolyAftertouch {
                channel,
                key: p1,
                pressure: p2,
            },
            status::PROGRAM_CHANGE => MidiEvent::ProgramChange {
                channel,
                program: p1,
            },
            status::CHANNEL_PRESSURE => MidiEvent::ChannelPressure {
                channel,
                pressure: p1,
            },
            status::CONTROL_CHANGE => MidiEvent::ControlChange {
                channel,
                raw: [self.status, p1, p2],
            },
            status::PITCH_BEND => MidiEvent::PitchBend {
                channel,
                raw: [self.status, p1, p2],
            },
            _ => return None,
        };
        Some(event)
    }
}
