//! Codec benchmarks for huddle-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_protocol::{codec, ChatMessage, ClientEvent, ServerEvent};

fn chat_event(text_len: usize) -> ServerEvent {
    ServerEvent::NewMessage {
        message: ChatMessage {
            id: "msg_1700000000000_2a".into(),
            user_id: "u_b2".into(),
            user_name: "Bob".into(),
            text: "x".repeat(text_len),
            timestamp: 1_700_000_000_000,
        },
    }
}

fn bench_encode_message(c: &mut Criterion) {
    let event = chat_event(64);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("new_message_64B", |b| {
        b.iter(|| codec::encode(black_box(&event)))
    });
    group.finish();
}

fn bench_decode_message(c: &mut Criterion) {
    let event = ClientEvent::SendMessage {
        room_id: "x7GpT2qLfA".into(),
        text: "x".repeat(64),
    };
    let encoded = codec::encode_client(&event).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("send_message_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_roundtrip(c: &mut Criterion) {
    let event = chat_event(256);

    c.bench_function("roundtrip_256B", |b| {
        b.iter(|| {
            let encoded = codec::encode(black_box(&event)).unwrap();
            codec::decode_server(black_box(&encoded)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_message,
    bench_decode_message,
    bench_roundtrip
);
criterion_main!(benches);
