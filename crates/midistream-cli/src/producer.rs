//! Synthetic driver side for the demo.

use std::thread;

use midistream_pipe::{PipeProducer, TransportError};
use tracing::{debug, warn};

/// GM system on.
const GM_RESET: [u8; 6] = [0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerReport {
    pub short_events: usize,
    pub long_events: usize,
}

/// Writes a sysex reset, a program change and `notes` note on/off pairs.
/// Only the first note carries its status byte; the rest use running status,
/// with a zero velocity note on standing in for note off.
pub fn play(mut producer: PipeProducer, notes: usize) -> ProducerReport {
    let pipe = producer.id();
    let channel = pipe.index() as u8;
    let mut report = ProducerReport::default();

    if send_long(&mut producer, &GM_RESET) {
        report.long_events += 1;
    }
    if !send_short(&mut producer, pack(0xC0 | channel, channel * 8, 0)) {
        return report;
    }
    report.short_events += 1;

    for index in 0..notes {
        let key = 36 + (index % 48) as u8;
        let on = if index == 0 {
            pack(0x90 | channel, key, 100)
        } else {
            running(key, 100)
        };
        if !send_short(&mut producer, on) || !send_short(&mut producer, running(key, 0)) {
            break;
        }
        report.short_events += 2;
    }

    debug!(%pipe, ?report, "producer finished");
    report
}

fn pack(status: u8, data1: u8, data2: u8) -> u32 {
    u32::from_le_bytes([status, data1, data2, 0])
}

fn running(data1: u8, data2: u8) -> u32 {
    u32::from_le_bytes([data1, data2, 0, 0])
}

fn send_short(producer: &mut PipeProducer, event: u32) -> bool {
    loop {
        match producer.send_short(event) {
            Ok(()) => return true,
            Err(TransportError::Full) => thread::yield_now(),
            Err(err) => {
                warn!(pipe = %producer.id(), %err, "producer stopped");
                return false;
            }
        }
    }
}

fn send_long(producer: &mut PipeProducer, bytes: &[u8]) -> bool {
    loop {
        match producer.send_long(bytes) {
            Ok(()) => return true,
            Err(TransportError::Full) => thread::yield_now(),
            Err(err) => {
                warn!(pipe = %producer.id(), %err, "long event not sent");
                return false;
            }
        }
    }
}
