mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{pack, pack_running, pipe, Received, RecordingSink};
use midistream_host::{
    QueueSink, SinkError, StopToken, StreamStatus, StreamWorker, SynthSink, WorkerSettings,
};
use midistream_pipe::{LocalPipeHub, PipeChannel, PipeId, PipeProducer, PipeState, TransportError};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn settings() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::ZERO,
        ..WorkerSettings::default()
    }
}

fn worker_on(
    hub: &LocalPipeHub,
    capacity: usize,
    sink: Arc<dyn SynthSink>,
    settings: WorkerSettings,
) -> (StreamWorker, PipeProducer, StopToken) {
    let channel = PipeChannel::connect(hub, pipe(0), capacity).unwrap();
    let producer = hub.producer(pipe(0)).unwrap();
    let stop = StopToken::new();
    let worker = StreamWorker::new(
        channel,
        sink,
        stop.clone(),
        Arc::new(StreamStatus::new()),
        settings,
    );
    (worker, producer, stop)
}

#[test]
fn each_event_is_delivered_once() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0x90, 60, 100)).unwrap();
    producer.send_short(pack(0x80, 60, 0)).unwrap();
    producer.send_short(pack(0xC1, 5, 0)).unwrap();

    assert_eq!(worker.poll_cycle().unwrap(), 3);
    assert_eq!(worker.poll_cycle().unwrap(), 0);

    producer.send_short(pack(0xD1, 33, 0)).unwrap();
    assert_eq!(worker.poll_cycle().unwrap(), 1);

    assert_eq!(
        sink.events(pipe(0)),
        vec![
            Received::NoteOn(0, 60, 100),
            Received::NoteOff(0, 60, 0),
            Received::ProgramChange(1, 5),
            Received::ChannelPressure(1, 33),
        ]
    );

    let snapshot = worker.status().snapshot(pipe(0), 0);
    assert_eq!(snapshot.short_events, 4);
    assert_eq!(snapshot.drain_cycles, 2);
    assert_eq!(snapshot.read_head, 4);
    assert_eq!(snapshot.write_head, 4);
    assert_eq!(snapshot.state, PipeState::Open);
}

#[test]
fn running_status_carries_across_cycles() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0x92, 64, 90)).unwrap();
    worker.poll_cycle().unwrap();
    producer.send_short(pack_running(67, 91)).unwrap();
    producer.send_short(pack_running(71, 0)).unwrap();
    worker.poll_cycle().unwrap();

    assert_eq!(
        sink.events(pipe(0)),
        vec![
            Received::NoteOn(2, 64, 90),
            Received::NoteOn(2, 67, 91),
            Received::NoteOn(2, 71, 0),
        ]
    );
}

#[test]
fn ring_wraps_without_losing_order() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 16, sink.clone(), settings());
    assert_eq!(producer.capacity(), 16);

    let mut expected = Vec::new();
    for round in 0..5u8 {
        for step in 0..10u8 {
            let key = round * 10 + step;
            producer.send_short(pack(0xB0, key, step)).unwrap();
            expected.push(Received::Raw3([0xB0, key, step]));
        }
        assert_eq!(worker.poll_cycle().unwrap(), 10);
        assert_eq!(producer.read_head(), producer.write_head());
    }

    assert_eq!(sink.events(pipe(0)), expected);
}

#[test]
fn unmapped_events_are_skipped() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0xF8, 0, 0)).unwrap();
    producer.send_short(pack(0xE0, 0x00, 0x40)).unwrap();
    assert_eq!(worker.poll_cycle().unwrap(), 2);

    assert_eq!(
        sink.events(pipe(0)),
        vec![Received::Raw3([0xE0, 0x00, 0x40])]
    );
    let snapshot = worker.status().snapshot(pipe(0), 0);
    assert_eq!(snapshot.skipped_events, 1);
    assert_eq!(snapshot.short_events, 1);
}

#[test]
fn long_events_are_forwarded_exactly() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    // Nothing queued means nothing forwarded.
    assert_eq!(worker.poll_cycle().unwrap(), 0);
    assert!(sink.events(pipe(0)).is_empty());

    let sysex = [0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];
    producer.send_long(&sysex).unwrap();
    producer.send_short(pack(0x90, 48, 70)).unwrap();
    assert_eq!(worker.poll_cycle().unwrap(), 2);

    assert_eq!(
        sink.events(pipe(0)),
        vec![Received::Long(sysex.to_vec()), Received::NoteOn(0, 48, 70)]
    );
    assert_eq!(worker.status().snapshot(pipe(0), 0).long_events, 1);
}

#[test]
fn oversized_long_event_is_dropped() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let settings = WorkerSettings {
        long_buffer_bytes: 4,
        ..settings()
    };
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings);

    producer.send_long(&[0xF0, 1, 2, 3, 4, 5, 0xF7]).unwrap();
    producer.send_long(&[0xF0, 1, 0xF7]).unwrap();
    worker.poll_cycle().unwrap();
    worker.poll_cycle().unwrap();

    assert_eq!(sink.events(pipe(0)), vec![Received::Long(vec![0xF0, 1, 0xF7])]);
}

#[test]
fn stop_delivers_everything_already_written() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_long(&[0xF0, 0x01, 0xF7]).unwrap();
    producer.send_long(&[0xF0, 0x02, 0xF7]).unwrap();
    for key in 0..20 {
        producer.send_short(pack(0x90, key, 1)).unwrap();
    }
    stop.cancel();
    worker.run().unwrap();

    let events = sink.events(pipe(0));
    assert_eq!(events.len(), 22);
    assert_eq!(events[0], Received::Long(vec![0xF0, 0x01, 0xF7]));
    assert_eq!(events[1], Received::Long(vec![0xF0, 0x02, 0xF7]));
    assert_eq!(events[21], Received::NoteOn(0, 19, 1));
}

#[test]
fn nothing_is_delivered_after_finish() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::new();
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0x90, 60, 100)).unwrap();
    worker.poll_cycle().unwrap();
    let status = Arc::clone(worker.status());
    worker.finish();

    assert_eq!(status.state(), PipeState::Closed);
    assert_eq!(
        producer.send_short(pack(0x80, 60, 0)),
        Err(TransportError::Disconnected)
    );
    assert_eq!(sink.events(pipe(0)), vec![Received::NoteOn(0, 60, 100)]);
    assert!(!hub.is_connected(pipe(0)));
}

#[test]
fn rejected_events_do_not_stop_the_stream() {
    let hub = LocalPipeHub::new();
    // Never opened, so every dispatch is rejected.
    let sink = Arc::new(QueueSink::new(8));
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0x90, 60, 100)).unwrap();
    producer.send_short(pack(0x90, 62, 100)).unwrap();
    assert_eq!(worker.poll_cycle().unwrap(), 2);

    let snapshot = worker.status().snapshot(pipe(0), 0);
    assert_eq!(snapshot.dispatch_errors, 2);
    assert_eq!(snapshot.short_events, 0);
}

#[test]
fn fatal_sink_errors_end_the_cycle() {
    let hub = LocalPipeHub::new();
    let sink = RecordingSink::failing_on(13);
    let (mut worker, mut producer, _stop) = worker_on(&hub, 64, sink.clone(), settings());

    producer.send_short(pack(0x90, 12, 1)).unwrap();
    producer.send_short(pack(0x90, 13, 1)).unwrap();
    producer.send_short(pack(0x90, 14, 1)).unwrap();

    let err = worker.poll_cycle().unwrap_err();
    assert!(matches!(err, SinkError::Fatal(_)));
    assert_eq!(sink.events(pipe(0)), vec![Received::NoteOn(0, 12, 1)]);
}

/// Writes a follow-up note back into the pipe for every note it receives.
struct EchoSink {
    producer: Mutex<PipeProducer>,
    received: Mutex<Vec<u8>>,
}

impl SynthSink for EchoSink {
    fn dispatch_note_on(&self, _: PipeId, _: u8, key: u8, velocity: u8) -> Result<(), SinkError> {
        self.received.lock().push(key);
        if key < 100 {
            self.producer
                .lock()
                .send_short(pack(0x90, key + 100, velocity))
                .map_err(|err| SinkError::Fatal(err.to_string()))?;
        }
        Ok(())
    }

    fn dispatch_note_off(&self, _: PipeId, _: u8, _: u8, _: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn dispatch_poly_aftertouch(&self, _: PipeId, _: u8, _: u8, _: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn dispatch_channel_pressure(&self, _: PipeId, _: u8, _: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn dispatch_program_change(&self, _: PipeId, _: u8, _: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn dispatch_raw3(&self, _: PipeId, _: [u8; 3]) -> Result<(), SinkError> {
        Ok(())
    }

    fn dispatch_long(&self, _: PipeId, _: &[u8]) -> Result<(), SinkError> {
        Ok(())
    }
}

#[test]
fn drain_stops_at_the_write_head_seen_when_the_cycle_starts() {
    let hub = LocalPipeHub::new();
    let channel = PipeChannel::connect(&hub, pipe(0), 64).unwrap();
    let mut producer = hub.producer(pipe(0)).unwrap();
    producer.send_short(pack(0x90, 1, 10)).unwrap();
    producer.send_short(pack(0x90, 2, 20)).unwrap();

    let sink = Arc::new(EchoSink {
        producer: Mutex::new(producer),
        received: Mutex::new(Vec::new()),
    });
    let mut worker = StreamWorker::new(
        channel,
        sink.clone(),
        StopToken::new(),
        Arc::new(StreamStatus::new()),
        settings(),
    );

    assert_eq!(worker.poll_cycle().unwrap(), 2);
    assert_eq!(*sink.received.lock(), vec![1, 2]);
    assert_eq!(worker.poll_cycle().unwrap(), 2);
    assert_eq!(worker.poll_cycle().unwrap(), 0);
    assert_eq!(*sink.received.lock(), vec![1, 2, 101, 102]);
}
