//! Criterion benchmarks for the client frame codec and the serial sync frame.
//!
//! The sync loop builds one frame every 40 ms and every key event goes through
//! the codec, so both should stay far below a microsecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package rokenbok-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rokenbok_core::{decode_message, encode_message, Button, Car, HubState, Message};

fn bench_codec(c: &mut Criterion) {
    let msg = Message::KeyPress {
        code: 24,
        pressed: true,
    };
    let frame = encode_message(&msg);

    c.bench_function("encode_key_press", |b| {
        b.iter(|| encode_message(black_box(&msg)))
    });
    c.bench_function("decode_key_press", |b| {
        b.iter(|| decode_message(black_box(&frame)))
    });
}

fn bench_sync_frame(c: &mut Criterion) {
    let hub = HubState::new();
    for player in 1..=8u8 {
        hub.set_button(Button::Forward, player, player % 2 == 0);
        let _ = hub.set_selection(player, Car::new(player));
    }

    c.bench_function("snapshot_to_sync_frame", |b| {
        b.iter(|| black_box(hub.snapshot()).to_sync_frame(0))
    });
}

criterion_group!(benches, bench_codec, bench_sync_frame);
criterion_main!(benches);
