use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use colwire::{registry, ByteSource, CodecConfig, DecodeProgress, Value, ValueRepr};

const ROWS: usize = 64 * 1024;

fn encoded_column(spec: &str, rows: Vec<Vec<Value>>) -> (std::sync::Arc<dyn colwire::ColumnCodec>, Vec<u8>) {
    let descr = registry::descriptor_for(spec, "bench").unwrap();
    let codec = registry::codec_for(&descr, &CodecConfig::default()).unwrap();
    let n_rows = rows.len();
    let mut sink = BytesMut::new();
    codec.writer(rows, 0).serialize(&mut sink, 0, n_rows).unwrap();
    (codec, sink.to_vec())
}

fn bench_uint64_column(c: &mut Criterion) {
    let rows: Vec<Vec<Value>> = (0..ROWS as u64).map(|v| vec![Value::UInt64(v)]).collect();
    let (codec, wire) = encoded_column("UInt64", rows);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("uint64_whole_buffer", |b| {
        b.iter(|| {
            let mut reader = codec.reader(ROWS);
            let mut src = ByteSource::new();
            src.feed(&wire);
            assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
            black_box(reader.element(ROWS - 1, ValueRepr::Native).unwrap())
        })
    });
    group.bench_function("uint64_4k_chunks", |b| {
        b.iter(|| {
            let mut reader = codec.reader(ROWS);
            let mut src = ByteSource::new();
            for chunk in wire.chunks(4096) {
                src.feed(chunk);
                reader.read_column(&mut src).unwrap();
            }
            black_box(reader.element(0, ValueRepr::Native).unwrap())
        })
    });
    group.finish();
}

fn bench_low_cardinality_column(c: &mut Criterion) {
    let names = ["alpha", "beta", "gamma", "delta"];
    let rows: Vec<Vec<Value>> = (0..ROWS)
        .map(|i| vec![Value::from(names[i % names.len()])])
        .collect();
    let (codec, wire) = encoded_column("LowCardinality(String)", rows);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("low_cardinality_whole_buffer", |b| {
        b.iter(|| {
            let mut reader = codec.reader(ROWS);
            let mut src = ByteSource::new();
            src.feed(&wire);
            assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
            black_box(reader.element(ROWS - 1, ValueRepr::Native).unwrap())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_uint64_column, bench_low_cardinality_column);
criterion_main!(benches);
