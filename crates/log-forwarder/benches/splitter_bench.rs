//! 라인 분할 및 메시지 인코딩 벤치마크
//!
//! journalctl 출력과 비슷한 라인을 1024바이트 청크로 잘라 분할 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logbridge_forwarder::{LineSplitter, Message, SplitMode};

fn journal_stream(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        out.extend_from_slice(
            format!(
                "Jan 15 12:00:{:02} raspberrypi sensor[812]: reading #{i} temperature=21.{} humidity=40%\n",
                i % 60,
                i % 10
            )
            .as_bytes(),
        );
    }
    out
}

fn bench_split(c: &mut Criterion) {
    let stream = journal_stream(1000);
    let mut group = c.benchmark_group("line_splitter");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for mode in [SplitMode::Buffered, SplitMode::PerChunk] {
        group.bench_with_input(
            BenchmarkId::new("chunks_1024", format!("{mode:?}")),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut splitter = LineSplitter::new(mode, 64 * 1024);
                    let mut count = 0usize;
                    for chunk in stream.chunks(1024) {
                        count += splitter.push(black_box(chunk)).len();
                    }
                    count += splitter.finish().len();
                    black_box(count)
                });
            },
        );
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let line = "Jan 15 12:00:00 raspberrypi sensor[812]: reading \"ok\" temperature=21.5";
    let mut group = c.benchmark_group("message");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode", |b| {
        b.iter(|| Message::encode(black_box(line)));
    });

    group.finish();
}

criterion_group!(benches, bench_split, bench_encode);
criterion_main!(benches);
