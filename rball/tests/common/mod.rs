//! Common fixtures for rball integration tests

#![allow(dead_code)]

use ndarray::{Array, Array1, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rball::GridGenerator;

pub const CHANNELS: usize = 128;
pub const ENERGY_BINS: usize = 64;

/// Grid point coordinates in radians
pub struct GridFixture {
    pub theta: Array1<f64>,
    pub phi: Array1<f64>,
}

impl GridFixture {
    pub fn len(&self) -> usize {
        self.theta.len()
    }
}

/// Quasi-uniform points on a Fibonacci spiral, pole to pole
pub fn fibonacci_sphere(n: usize) -> GridFixture {
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let mut theta = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);

    for i in 0..n {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        theta.push(z.asin());
        phi.push((i as f64 * golden_angle).rem_euclid(std::f64::consts::TAU));
    }

    GridFixture {
        theta: Array1::from(theta),
        phi: Array1::from(phi),
    }
}

/// Icosahedral grid from the crate's own generator
pub fn icosahedral(level: u32, face_points: bool) -> GridFixture {
    let points = GridGenerator::new(level, face_points)
        .generate()
        .expect("valid refinement level");
    GridFixture {
        theta: Array1::from(points.theta().to_vec()),
        phi: Array1::from(points.phi().to_vec()),
    }
}

/// Random non-negative response matrices, reproducible from `seed`
pub fn random_matrices(n: usize, channels: usize, bins: usize, seed: u64) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_simple_fn((n, channels, bins), || rng.gen::<f64>())
}

/// Matrices whose first row holds the unit vector of their grid point
pub fn position_matrices(grid: &GridFixture, channels: usize, bins: usize) -> Array3<f64> {
    assert!(bins >= 3);
    Array3::from_shape_fn((grid.len(), channels, bins), |(i, c, e)| {
        if c != 0 {
            return 0.0;
        }
        let v = sphere_math::lonlat_to_xyz(grid.phi[i], grid.theta[i]);
        match e {
            0 => v.x,
            1 => v.y,
            2 => v.z,
            _ => 0.0,
        }
    })
}

/// Strictly increasing energy edges for `bins` bins
pub fn edges(bins: usize) -> Array1<f64> {
    Array::logspace(10.0, 1.0, 4.0, bins + 1)
}
