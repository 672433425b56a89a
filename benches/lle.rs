use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use trajviz::embedding::{LleConfig, LleMethod, LocallyLinearEmbedding, Projection};

/// Noisy swiss-roll-like curve embedded in `d` dimensions.
fn make_x(n: usize, d: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::<f64>::zeros((n, d));
    for i in 0..n {
        let t = 3.0 * i as f64 / n as f64;
        for k in 0..d {
            let z: f64 = StandardNormal.sample(&mut rng);
            let base = match k {
                0 => t * t.cos(),
                1 => t * t.sin(),
                _ => 0.0,
            };
            x[[i, k]] = base + 0.05 * z;
        }
    }
    x
}

fn bench_lle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lle");
    group.sample_size(10);

    for &(n, d) in &[(40usize, 5usize), (120, 8), (300, 8)] {
        let x = make_x(n, d, 7);
        for method in [LleMethod::Standard, LleMethod::Modified] {
            let lle = LocallyLinearEmbedding::new(LleConfig {
                n_neighbors: 12,
                method,
                ..LleConfig::default()
            });
            group.bench_with_input(
                BenchmarkId::new(format!("fit_{method:?}"), format!("n{n}_d{d}")),
                &(n, d),
                |b, _| b.iter(|| lle.fit(&x.view()).unwrap()),
            );
        }

        let fitted = LocallyLinearEmbedding::new(LleConfig {
            n_neighbors: 12,
            ..LleConfig::default()
        })
        .fit(&x.view())
        .unwrap();
        group.bench_with_input(
            BenchmarkId::new("transform", format!("n{n}_d{d}")),
            &(n, d),
            |b, _| b.iter(|| fitted.transform(&x.view()).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lle);
criterion_main!(benches);
