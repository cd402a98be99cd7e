#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use midistream_pipe::{
    LocalPipeHub, PipeId, PipeTransport, TransportConnector, TransportError, MIN_CAPACITY,
};

// Replays push/pop operations against a queue model of the short ring.
fuzz_target!(|data: &[u8]| {
    let hub = LocalPipeHub::new();
    let Ok(id) = PipeId::new(0) else { return };
    let Ok(mut consumer) = hub.connect(id, MIN_CAPACITY) else { return };
    let Ok(mut producer) = hub.producer(id) else { return };
    let mut model = VecDeque::new();

    for (step, &op) in data.iter().enumerate() {
        if op & 1 == 0 {
            let event = u32::from(op) << 8 | step as u32;
            match producer.send_short(event) {
                Ok(()) => model.push_back(event),
                Err(TransportError::Full) => assert_eq!(model.len(), MIN_CAPACITY - 1),
                Err(err) => panic!("unexpected write error {err}"),
            }
        } else {
            assert_eq!(consumer.has_pending_data(), !model.is_empty());
            if consumer.has_pending_data() {
                let event = consumer.fetch_short_event().expect("pending event");
                consumer.reset_read_head_if_needed();
                assert_eq!(Some(event), model.pop_front());
            }
        }
        assert!(consumer.read_head() < MIN_CAPACITY as i32);
        assert!(consumer.write_head() < MIN_CAPACITY as i32);
    }
});
