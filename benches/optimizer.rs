use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use forecast_edge::portfolio::{CorrelationMatrix, PortfolioOptimizer};

fn returns(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i * 37) % 11) as f64 * 0.01 - 0.03).collect()
}

fn bench_optimize_weights(c: &mut Criterion) {
    let optimizer = PortfolioOptimizer::default();
    let mut group = c.benchmark_group("optimize_weights");

    for n in [4usize, 16, 64] {
        let labels: Vec<String> = (0..n).map(|i| format!("m{}", i)).collect();
        let corr = CorrelationMatrix::uniform(labels, 0.1);
        let r = returns(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| optimizer.optimize_weights(black_box(&r), corr.values(), None, 0.5))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_optimize_weights);
criterion_main!(benches);
