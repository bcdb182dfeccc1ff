use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use navigation::models::Coordinate;
use navigation::polyline::{decode, encode};

/// A campus-scale walk: `points` fixes a few meters apart.
fn walk(points: usize) -> Vec<Coordinate> {
    (0..points)
        .map(|i| {
            let t = i as f64;
            Coordinate {
                lat: 2.8170 - t * 0.00004,
                lon: 101.7590 + t * 0.00003 + (t * 0.3).sin() * 0.00001,
            }
        })
        .collect()
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyline_decode");

    for points in [10, 100, 1_000, 10_000] {
        let encoded = encode(&walk(points));
        group.bench_with_input(BenchmarkId::from_parameter(points), &encoded, |b, encoded| {
            b.iter(|| decode(black_box(encoded)))
        });
    }

    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let path = walk(1_000);
    c.bench_function("polyline_encode_1000", |b| b.iter(|| encode(black_box(&path))));
}

criterion_group!(benches, benchmark_decode, benchmark_encode);
criterion_main!(benches);
