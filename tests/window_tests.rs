/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

use dmft_rs::dft::BandStructure;
use dmft_rs::window::{resolve, resolve_all, BoundSpec, WindowError};
use ndarray::Array3;

/// A two-spin band structure whose up channel is rigidly shifted
fn spin_split_bands(shift: f64) -> BandStructure {
    let enk = Array3::from_shape_fn((4, 3, 2), |(b, k, s)| {
        let base = b as f64 - 1.5 + 0.05 * k as f64;
        if s == 0 {
            base
        } else {
            base + shift
        }
    });
    let occupy = Array3::zeros((4, 3, 2));
    BandStructure::new(enk, occupy).unwrap()
}

#[test]
fn test_energy_window_differs_per_spin() {
    let bands = spin_split_bands(0.6);
    let window = resolve(
        &BoundSpec::Energy {
            emin: -0.75,
            emax: 0.75,
        },
        &bands,
    )
    .unwrap();

    // Down channel keeps bands 1..=2; the shifted up channel loses
    // band 2 at every k-point but gains nothing below.
    assert_eq!(window.range(0, 0), (1, 2));
    assert_eq!(window.range(0, 1), (1, 1));
    assert_eq!(window.max_width, 2);
}

#[test]
fn test_energy_window_tracks_dispersion() {
    // A single band crossing emax between k-points
    let enk = Array3::from_shape_fn((2, 2, 1), |(b, k, _)| {
        if b == 0 {
            -0.5
        } else {
            0.4 + 0.4 * k as f64
        }
    });
    let bands = BandStructure::new(enk, Array3::zeros((2, 2, 1))).unwrap();

    let window = resolve(
        &BoundSpec::Energy {
            emin: -1.0,
            emax: 0.5,
        },
        &bands,
    )
    .unwrap();

    assert_eq!(window.range(0, 0), (0, 1));
    assert_eq!(window.range(1, 0), (0, 0));
    assert_eq!(window.width(0, 0), 2);
    assert_eq!(window.width(1, 0), 1);
}

#[test]
fn test_band_window_ignores_eigenvalues() {
    let bands = spin_split_bands(10.0);
    let window = resolve(&BoundSpec::Bands { lo: 0, hi: 3 }, &bands).unwrap();
    for k in 0..3 {
        for s in 0..2 {
            assert_eq!(window.range(k, s), (0, 3));
        }
    }
}

#[test]
fn test_per_group_windows_resolve_independently() {
    let bands = spin_split_bands(0.0);
    let specs = [
        BoundSpec::Bands { lo: 0, hi: 1 },
        BoundSpec::Energy {
            emin: -0.1,
            emax: 2.0,
        },
    ];
    let windows = resolve_all(&specs, 2, &bands).unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].range(0, 0), (0, 1));
    assert_eq!(windows[1].range(0, 0), (2, 3));
}

#[test]
fn test_disjoint_energy_window_reports_band_range() {
    let bands = spin_split_bands(0.0);
    match resolve(
        &BoundSpec::Energy {
            emin: 50.0,
            emax: 60.0,
        },
        &bands,
    ) {
        Err(WindowError::NoOverlap {
            band_min, band_max, ..
        }) => {
            assert!(band_min < band_max);
            assert!(band_max < 50.0);
        }
        other => panic!("expected NoOverlap, got {:?}", other),
    }
}
