//! Benchmark for event-id hashing and difficulty scoring.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use powstr_core::{leading_zero_bits, EventTemplate};

fn bench_event_id(c: &mut Criterion) {
    let template = EventTemplate::text_note(
        "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d",
        "benchmark note content",
        20,
        1_700_000_000,
    );

    c.bench_function("event_id", |b| b.iter(|| black_box(&template).id()));
}

fn bench_mining_iteration(c: &mut Criterion) {
    let mut template = EventTemplate::text_note(
        "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d",
        "benchmark note content",
        20,
        1_700_000_000,
    );

    c.bench_function("mine_iteration", |b| {
        let mut nonce: u64 = 0;
        b.iter(|| {
            template.set_nonce(nonce).unwrap();
            nonce = nonce.wrapping_add(1);
            leading_zero_bits(&black_box(&template).id())
        })
    });
}

criterion_group!(benches, bench_event_id, bench_mining_iteration);
criterion_main!(benches);
