//! Benchmarks for frame encoding and decoding
//!
//! Decoding is measured both for whole frames already buffered and for a
//! buffer holding many small frames back to back, the shape a busy node's
//! DATA stream has on the inspector side.

use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use spyglass_protocol::{BytesMut, Frame, try_decode};

fn data_frame(size: usize) -> Frame {
    Frame::data(vec![0xABu8; size])
}

/// Benchmark header + payload encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [64, 4096, 256 * 1024] {
        let frame = data_frame(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}_bytes"), |b| b.iter(|| black_box(frame.encode())));
    }

    group.finish();
}

/// Benchmark decoding one buffered frame
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [64, 4096, 256 * 1024] {
        let encoded = data_frame(size).encode();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}_bytes"), |b| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                black_box(try_decode(&mut buf))
            })
        });
    }

    group.finish();
}

/// Benchmark draining many small frames from one buffer
fn bench_decode_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode_stream");

    let mut stream = BytesMut::new();
    for _ in 0..500 {
        stream.extend_from_slice(&data_frame(100).encode());
    }

    group.throughput(Throughput::Elements(500));
    group.bench_function("500_frames", |b| {
        b.iter(|| {
            let mut buf = stream.clone();
            while let Ok(Some(frame)) = try_decode(&mut buf) {
                black_box(frame);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_decode_stream);

criterion_main!(benches);
