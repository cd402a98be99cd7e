use midistream_codec::{decode_short, MidiEvent};
use midistream_host::{StreamSnapshot, SynthCommand};

/// One-line, human readable rendering of a command taken from the sink.
pub fn describe(command: &SynthCommand) -> String {
    match command {
        SynthCommand::NoteOn {
            channel,
            key,
            velocity: 0,
        } => format!("note off  ch{:<2} key {key:3} (velocity 0)", channel + 1),
        SynthCommand::NoteOn {
            channel,
            key,
            velocity,
        } => format!("note on   ch{:<2} key {key:3} vel {velocity:3}", channel + 1),
        SynthCommand::NoteOff {
            channel,
            key,
            velocity,
        } => format!("note off  ch{:<2} key {key:3} vel {velocity:3}", channel + 1),
        SynthCommand::PolyAftertouch {
            channel,
            key,
            pressure,
        } => format!("poly at   ch{:<2} key {key:3} prs {pressure:3}", channel + 1),
        SynthCommand::ChannelPressure { channel, pressure } => {
            format!("chan prs  ch{:<2} prs {pressure:3}", channel + 1)
        }
        SynthCommand::ProgramChange { channel, program } => {
            format!("program   ch{:<2} pgm {program:3}", channel + 1)
        }
        SynthCommand::Raw3(bytes) => describe_raw3(*bytes),
        SynthCommand::Long(bytes) => format!("sysex     {} bytes {}", bytes.len(), hex(bytes, 8)),
    }
}

fn describe_raw3(bytes: [u8; 3]) -> String {
    let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
    match decode_short(raw, 0).0 {
        Some(MidiEvent::ControlChange { channel, .. }) => format!(
            "control   ch{:<2} cc {:3} val {:3}",
            channel + 1,
            bytes[1],
            bytes[2]
        ),
        Some(MidiEvent::PitchBend { channel, .. }) => {
            let value = (i32::from(bytes[2]) << 7 | i32::from(bytes[1])) - 8192;
            format!("bend      ch{:<2} {value:+}", channel + 1)
        }
        _ => format!("raw       {}", hex(&bytes, 3)),
    }
}

fn hex(bytes: &[u8], limit: usize) -> String {
    let mut out: Vec<String> = bytes
        .iter()
        .take(limit)
        .map(|byte| format!("{byte:02X}"))
        .collect();
    if bytes.len() > limit {
        out.push("..".into());
    }
    out.join(" ")
}

pub fn status_line(snapshot: &StreamSnapshot) -> String {
    let state = format!("{:?}", snapshot.state);
    format!(
        "{} {state:<8} SRH/SWH: {:06}/{:06} short {:>7} long {:>4} \
         skipped {:>4} errors {:>4} voices {:>3}",
        snapshot.pipe,
        snapshot.read_head,
        snapshot.write_head,
        snapshot.short_events,
        snapshot.long_events,
        snapshot.skipped_events,
        snapshot.dispatch_errors,
        snapshot.active_voices,
    )
}
