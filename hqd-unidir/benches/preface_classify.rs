//! Benchmarks for preface classification hot paths.
//!
//! These benchmarks measure:
//! - Varint decoding at each encoded length
//! - Preface parsing from a complete view
//! - Full dispatch of a stream, whole and one byte per event
//!
//! Run with: cargo bench -p hqd-unidir --bench preface_classify

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hqd_unidir::{
    varint, DispatchSink, DispatcherConfig, PrefaceParser, UnidirStreamDispatcher,
    UnidirectionalStreamType,
};
use hqd_x::{PeekCallback, PeekChunk, PeekData, PeekHandlers, PushId, ReadCallback, ReadError, StreamId};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct CountingSink {
    hand_offs: Cell<u64>,
}

impl CountingSink {
    fn bump(&self) {
        self.hand_offs.set(self.hand_offs.get() + 1);
    }
}

impl DispatchSink for CountingSink {
    fn parse_stream_preface(&self, preface: u64) -> Option<UnidirectionalStreamType> {
        UnidirectionalStreamType::from_preface(preface)
    }
    fn assign_peek_callback(&self, _: StreamId, _: UnidirectionalStreamType, _: usize, _: PeekHandlers) {
        self.bump();
    }
    fn assign_read_callback(&self, _: StreamId, _: UnidirectionalStreamType, _: usize, _: Rc<dyn ReadCallback>) {
        self.bump();
    }
    fn on_new_push_stream(&self, _: StreamId, _: PushId, _: usize) {
        self.bump();
    }
    fn reject_stream(&self, _: StreamId) {
        self.bump();
    }
    fn control_stream_read_available(&self, _: StreamId) {}
    fn control_stream_read_error(&self, _: StreamId, _: &ReadError) {}
    fn on_partial_data_available(&self, _: StreamId, _: PeekData<'_>) {}
    fn process_expired_data(&self, _: StreamId, _: u64) {}
    fn process_rejected_data(&self, _: StreamId, _: u64) {}
}

fn encoded(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        varint::encode_buf(*v, &mut out).unwrap();
    }
    out
}

/// Benchmark varint decoding (per-preface hot path)
fn bench_varint_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_decode");
    group.throughput(Throughput::Elements(1));

    for value in [37u64, 15_293, 494_878_333, 151_288_809_941_952_652] {
        let bytes = encoded(&[value]);
        group.bench_with_input(BenchmarkId::from_parameter(bytes.len()), &bytes, |b, bytes| {
            b.iter(|| varint::decode(black_box(bytes)))
        });
    }

    group.finish();
}

/// Benchmark preface parsing from a complete view
fn bench_preface_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("preface_parse");
    group.throughput(Throughput::Elements(1));

    let cases = [
        ("control", encoded(&[0x00])),
        ("push", encoded(&[0x01, 1_000_000])),
        ("grease", encoded(&[0x21 + 0x1f * 1000])),
    ];
    for (name, bytes) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| {
                PrefaceParser::new().advance(black_box(bytes), UnidirectionalStreamType::from_preface)
            })
        });
    }

    group.finish();
}

/// Benchmark full dispatch: take ownership, peek until classified
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let sink = Rc::new(CountingSink::default());
    let dispatcher = UnidirStreamDispatcher::new(sink.clone(), DispatcherConfig::default());
    let push = encoded(&[0x01, 1_000_000]);

    group.bench_function("push_whole", |b| {
        let view = [PeekChunk::new(0, Bytes::copy_from_slice(&push), false)];
        b.iter(|| {
            dispatcher.take_temporary_ownership(StreamId(2)).unwrap();
            dispatcher.on_data_available(StreamId(2), black_box(&view));
        })
    });

    let views: Vec<[PeekChunk; 1]> = (1..=push.len())
        .map(|n| [PeekChunk::new(0, Bytes::copy_from_slice(&push[..n]), false)])
        .collect();
    group.bench_function("push_bytewise", |b| {
        b.iter(|| {
            dispatcher.take_temporary_ownership(StreamId(2)).unwrap();
            for view in &views {
                dispatcher.on_data_available(StreamId(2), black_box(view));
            }
        })
    });

    group.finish();
    black_box(sink.hand_offs.get());
}

criterion_group!(benches, bench_varint_decode, bench_preface_parse, bench_dispatch);

criterion_main!(benches);
