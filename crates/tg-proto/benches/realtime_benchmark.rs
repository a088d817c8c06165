use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tg_proto::realtime::{scan, ScanResult};

fn scan_dense_line(c: &mut Criterion) {
    let mut line = Vec::new();
    for i in 0..200 {
        line.extend_from_slice(b"G1 X10.5 Y20.25 F1500");
        if i % 37 == 0 {
            line.push(b'!');
        }
        line.push(b'\n');
    }

    c.bench_function("scan_dense_line", |b| {
        b.iter(|| {
            let mut scratch = vec![0u8; line.len()];
            let result: ScanResult<64> = scan(black_box(&line), &mut scratch);
            black_box(result.commands.len())
        })
    });
}

criterion_group!(benches, scan_dense_line);
criterion_main!(benches);
