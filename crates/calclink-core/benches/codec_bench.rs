//! Criterion benchmarks for the token codec and the packet builder.
//!
//! Run with:
//! ```bash
//! cargo bench --package calclink-core --bench codec_bench
//! ```

use calclink_core::{parse_program_content, PacketRequest, TokenCodec};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const SHORT_MESSAGE: &str = "Comms confirmed";

fn long_message() -> String {
    "What is the derivative of x^2 + 3x? (show work)ENTER".repeat(40)
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let codec = TokenCodec::shared();
    let long = long_message();

    let mut group = c.benchmark_group("token_encode");
    for (name, text) in [("short", SHORT_MESSAGE), ("long", long.as_str())] {
        group.bench_with_input(BenchmarkId::new("text", name), text, |b, text| {
            b.iter(|| codec.encode(black_box(text)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = TokenCodec::shared();
    let encoded = codec.encode(&long_message());

    let mut response = vec![0u8; 13];
    response.extend_from_slice(&encoded);

    let mut group = c.benchmark_group("token_decode");
    group.bench_function("tokens", |b| b.iter(|| codec.decode(black_box(&encoded))));
    group.bench_function("program_content", |b| {
        b.iter(|| parse_program_content(black_box(&response)))
    });
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let long = long_message();

    let mut group = c.benchmark_group("packet_build");
    group.bench_function("send_variable", |b| {
        b.iter(|| {
            PacketRequest::send_variable(black_box("A"), black_box("123.456"))
                .and_then(|req| req.build())
                .unwrap()
        })
    });
    group.bench_function("send_program", |b| {
        b.iter(|| {
            PacketRequest::send_program(black_box("QUESTION"), black_box(&long), true)
                .build()
                .unwrap()
        })
    });
    group.bench_function("read_program", |b| {
        b.iter(|| PacketRequest::read_program(black_box("QUESTION")).build().unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_build);
criterion_main!(benches);
