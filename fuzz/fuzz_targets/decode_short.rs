#![no_main]

use libfuzzer_sys::fuzz_target;
use midistream_codec::{decode_short, status, MidiEvent, ShortEvent};

fuzz_target!(|data: &[u8]| {
    let mut prior = data.first().copied().unwrap_or(0);
    for chunk in data.chunks_exact(4) {
        let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let (event, next) = decode_short(raw, prior);
        let resolved = ShortEvent::resolve(raw, prior);

        if status::is_status(chunk[0]) {
            assert_eq!(next, chunk[0]);
        } else {
            assert_eq!(next, prior);
        }
        assert_eq!(resolved.status(), next);

        if let Some(event) = event {
            assert!(status::is_status(next));
            assert_eq!(event.channel(), Some(next & 0x0F));
            assert!(!matches!(event, MidiEvent::Long(_)));
            if let Some((bytes, len)) = event.to_short_bytes() {
                assert!((2..=3).contains(&len));
                assert_eq!(bytes[0], next);
            }
        }
        prior = next;
    }
});
