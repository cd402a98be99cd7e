use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use midistream_codec::{decode_short, RunningStatus};
use midistream_pipe::{LocalPipeHub, PipeId, PipeTransport, TransportConnector};

const BLOCK: usize = 4_096;

/// Note on/off pairs where only every 64th event carries its status byte.
fn running_status_block() -> Vec<u32> {
    (0..BLOCK)
        .map(|index| {
            let key = 36 + (index % 48) as u32;
            let velocity = if index % 2 == 0 { 100 } else { 0 };
            if index % 64 == 0 {
                0x90 | key << 8 | velocity << 16
            } else {
                key | velocity << 8
            }
        })
        .collect()
}

fn decode(c: &mut Criterion) {
    let block = running_status_block();
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(BLOCK as u64));

    group.bench_function("decode_short_4096", |b| {
        b.iter(|| {
            let mut status = 0u8;
            let mut events = 0usize;
            for &raw in &block {
                let (event, next) = decode_short(black_box(raw), status);
                status = next;
                events += usize::from(event.is_some());
            }
            events
        });
    });

    group.bench_function("running_status_4096", |b| {
        b.iter(|| {
            let mut status = RunningStatus::new();
            block
                .iter()
                .filter_map(|&raw| status.decode(black_box(raw)))
                .count()
        });
    });

    group.finish();
}

fn ring(c: &mut Criterion) {
    let block = running_status_block();
    let mut group = c.benchmark_group("pipe");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(BLOCK as u64));

    group.bench_function("write_then_drain_4096", |b| {
        let hub = LocalPipeHub::new();
        let id = PipeId::new(0).expect("pipe id");
        let mut consumer = hub.connect(id, BLOCK * 2).expect("connect");
        let mut producer = hub.producer(id).expect("producer");

        b.iter(|| {
            for &raw in &block {
                producer.send_short(raw).expect("ring has room");
            }
            let mut status = RunningStatus::new();
            let mut decoded = 0usize;
            while consumer.has_pending_data() {
                let raw = consumer.fetch_short_event().expect("fetch");
                consumer.reset_read_head_if_needed();
                decoded += usize::from(status.decode(raw).is_some());
            }
            decoded
        });
    });

    group.finish();
}

criterion_group!(benches, decode, ring);
criterion_main!(benches);
