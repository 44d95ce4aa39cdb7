use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roastindex::index::IndexedPoint;
use roastindex::{IndexConfig, IndexKind, Point, QueryBox, SimilarityRanker};

fn random_points(count: usize, dims: usize) -> Vec<IndexedPoint> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|row| {
            let coords: Vec<f64> = (0..dims).map(|_| rng.gen_range(0.0..1000.0)).collect();
            IndexedPoint::new(Point::new(&coords), row)
        })
        .collect()
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    let config = IndexConfig::default();

    for &count in &[1_000usize, 10_000] {
        let points = random_points(count, 3);
        for kind in IndexKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.name(), count), &points, |b, points| {
                b.iter(|| kind.build(black_box(points.clone()), 3, &config))
            });
        }
    }

    group.finish();
}

fn benchmark_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_query");
    let config = IndexConfig::default();
    let points = random_points(10_000, 3);

    let mut narrow = QueryBox::unbounded(3);
    narrow.set_range(0, Some(100.0), Some(200.0));
    narrow.set_range(1, Some(400.0), Some(500.0));
    let wide = QueryBox::new(&[0.0, 0.0, 0.0], &[700.0, 700.0, 700.0]);

    for kind in IndexKind::ALL {
        let index = kind.build(points.clone(), 3, &config);
        group.bench_function(BenchmarkId::new(kind.name(), "narrow"), |b| {
            b.iter(|| index.query(black_box(&narrow)))
        });
        group.bench_function(BenchmarkId::new(kind.name(), "wide"), |b| {
            b.iter(|| index.query(black_box(&wide)))
        });
    }

    group.finish();
}

fn benchmark_similarity(c: &mut Criterion) {
    let words = ["fruity", "bright", "chocolate", "citrus", "floral", "smoky", "sweet", "nutty"];
    let mut rng = StdRng::seed_from_u64(7);
    let reviews: Vec<String> = (0..2_000)
        .map(|_| {
            (0..12)
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    c.bench_function("similarity_rank_2000", |b| {
        b.iter(|| SimilarityRanker::new(black_box(&reviews)).nearest(&["fruity", "bright"], 10))
    });
}

criterion_group!(benches, benchmark_build, benchmark_query, benchmark_similarity);
criterion_main!(benches);
