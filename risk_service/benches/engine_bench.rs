// Benchmarks for the risk engine and codec
//
// Tests:
// - accept decision latency (fresh book per batch)
// - reject decision latency (steady state, no mutation)
// - inbound decode and response encode

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use risk_service::engine::{RiskEngine, RiskLimits};
use risk_service::protocol::{self, NewOrder, OrderResponse, OrderStatus};

fn bench_new_order_accept(c: &mut Criterion) {
    c.bench_function("engine_new_order_accept", |b| {
        b.iter_batched(
            || RiskEngine::new(RiskLimits::new(u32::MAX as u64, u32::MAX as u64)),
            |mut engine| {
                let response = engine.handle_new_order(&NewOrder {
                    listing_id: black_box(1),
                    order_id: black_box(1),
                    quantity: black_box(100),
                    price: black_box(10_000),
                    side: b'B',
                });
                black_box(response);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_new_order_reject(c: &mut Criterion) {
    // A zero limit rejects every order without mutating the book, so
    // one engine serves the whole run.
    let mut engine = RiskEngine::new(RiskLimits::new(0, 0));
    c.bench_function("engine_new_order_reject", |b| {
        b.iter(|| {
            let response = engine.handle_new_order(&NewOrder {
                listing_id: black_box(1),
                order_id: black_box(1),
                quantity: black_box(100),
                price: black_box(10_000),
                side: b'B',
            });
            black_box(response);
        });
    });
}

fn bench_decode_new_order(c: &mut Criterion) {
    let frame = b"1 46 7 1700000000 1 10 99 25 10000 66";
    c.bench_function("codec_decode_new_order", |b| {
        b.iter(|| {
            let header = protocol::decode_header(black_box(frame)).unwrap();
            let message = protocol::decode_inbound(&header, black_box(frame)).unwrap();
            black_box(message);
        });
    });
}

fn bench_encode_response(c: &mut Criterion) {
    let response = OrderResponse {
        order_id: 123_456_789,
        status: OrderStatus::Accepted,
    };
    c.bench_function("codec_encode_response", |b| {
        b.iter(|| {
            let frame = protocol::encode_frame(black_box(&response), 1, 1_700_000_000);
            black_box(frame);
        });
    });
}

criterion_group!(
    benches,
    bench_new_order_accept,
    bench_new_order_reject,
    bench_decode_new_order,
    bench_encode_response
);
criterion_main!(benches);
