use bsp_decoder::{Decoder, Field, Repeat, Schema};
use bsp_stream::ByteStream;
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

/// `count` length-prefixed records of `body` bytes each.
fn records(count: usize, body: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * (4 + body));
    for i in 0..count {
        out.extend_from_slice(&u32::try_from(body).unwrap().to_le_bytes());
        out.extend(std::iter::repeat_n(u8::try_from(i % 251).unwrap(), body));
    }
    out
}

fn record_schema() -> Schema {
    Schema::builder("record")
        .field("size", Field::u32())
        .field("data", Field::bytes("size"))
        .repeat(Repeat::Forever)
        .build()
        .unwrap()
}

fn decode_chunked(input: &[u8], chunk: usize) -> usize {
    let mut decoder = Decoder::new();
    decoder.activate(record_schema()).unwrap();
    let shared = Bytes::copy_from_slice(input);
    let mut pos = 0;
    while pos < shared.len() {
        let end = (pos + chunk).min(shared.len());
        decoder.push(shared.slice(pos..end)).unwrap();
        pos = end;
    }
    decoder.end_stream().unwrap();
    decoder.offset()
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let input = records(1_000, 60);

    let mut group = c.benchmark_group("decode_chunked");
    group.throughput(Throughput::Bytes(input.len() as u64));

    for chunk in [1, 16, 256, 4096, input.len()] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| decode_chunked(&input, chunk));
        });
    }
    group.finish();
}

fn bench_record_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_record_size");

    for body in [0, 64, 4096] {
        let input = records(256, body);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(body), &input, |b, input| {
            b.iter(|| decode_chunked(input, 1024));
        });
    }
    group.finish();
}

fn bench_stream_window(c: &mut Criterion) {
    let mut stream = ByteStream::new();
    for chunk in records(64, 60).chunks(7) {
        stream.push(Bytes::copy_from_slice(chunk));
    }

    let mut group = c.benchmark_group("stream_window");
    group.bench_function("inside_chunk", |b| {
        b.iter(|| stream.window(701, 704).unwrap());
    });
    group.bench_function("across_chunks", |b| {
        b.iter(|| stream.window(100, 1_100).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_chunk_sizes,
    bench_record_sizes,
    bench_stream_window
);
criterion_main!(benches);
