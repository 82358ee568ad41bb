/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dmft_rs::utils::{adjoint, eigh, invert_complex};
use ndarray::Array2;
use num_complex::Complex64;

fn test_matrix(n: usize, seed: u64) -> Array2<Complex64> {
    let mut state = seed;
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) - 1.0
    };
    let mut m = Array2::from_shape_fn((n, n), |_| Complex64::new(next(), next()));
    // Diagonally dominant so the inverse is well conditioned
    for i in 0..n {
        m[(i, i)] += Complex64::new(n as f64, 0.0);
    }
    m
}

fn linear_algebra_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Linear Algebra");

    for &n in &[8usize, 24, 48] {
        let m = test_matrix(n, 7);
        group.bench_function(format!("invert_complex_{}x{}", n, n), |b| {
            b.iter(|| black_box(invert_complex(black_box(&m)).unwrap()))
        });
    }

    for &n in &[5usize, 12] {
        let m = test_matrix(n, 11);
        let h = &m + &adjoint(&m);
        group.bench_function(format!("eigh_{}x{}", n, n), |b| {
            b.iter(|| black_box(eigh(black_box(&h)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, linear_algebra_benchmark);
criterion_main!(benches);
