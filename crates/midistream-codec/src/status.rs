//! Channel voice event types (high nibble of a status byte).

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_AFTERTOUCH: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

/// Bit that marks a byte as a status byte rather than a data byte.
pub const STATUS_BIT: u8 = 0x80;

#[inline]
#[must_use]
pub const fn is_status(byte: u8) -> bool {
    byte & STATUS_BIT != 0
}

#[inline]
#[must_use]
pub const fn event_type(status: u8) -> u8 {
    status & 0xF0
}

#[inline]
#[must_use]
pub const fn channel(status: u8) -> u8 {
    status & 0x0F
}
