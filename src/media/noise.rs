// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic 2D gradient noise
//!
//! Every lattice vertex gets a unit gradient picked from a fixed pool by
//! hashing the vertex coordinates, so the lattice itself is never stored.
//! The pool is generated once from a seed; two fields built with the same
//! seed, pool size and curve return bit-identical samples.

use crate::constants::noise::{HASH_MUL, ROW_MIX};
use crate::errors::{AgeError, AgeResult};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Smoothing curve used between lattice vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Identity
    Linear,
    /// 3w² - 2w³
    Cubic,
    /// 6w⁵ - 15w⁴ + 10w³
    #[default]
    Quintic,
}

impl Interpolation {
    #[inline]
    pub fn apply(self, w: f32) -> f32 {
        match self {
            Interpolation::Linear => w,
            Interpolation::Cubic => w * w * (3.0 - 2.0 * w),
            Interpolation::Quintic => w * w * w * (w * (w * 6.0 - 15.0) + 10.0),
        }
    }
}

/// Integer avalanche hash over the lattice key
#[inline]
fn hash(x: u32) -> u32 {
    let x = ((x >> 16) ^ x).wrapping_mul(HASH_MUL);
    let x = ((x >> 16) ^ x).wrapping_mul(HASH_MUL);
    (x >> 16) ^ x
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Gradient noise field with a write-once gradient pool
#[derive(Debug, Clone)]
pub struct NoiseField {
    max_gradients: usize,
    interpolation: Interpolation,
    gradients: Vec<[f32; 2]>,
}

impl NoiseField {
    /// Create an unbuilt field; call [`NoiseField::build_grid`] before sampling
    pub fn new(max_gradients: usize, interpolation: Interpolation) -> AgeResult<Self> {
        if max_gradients < 2 {
            return Err(AgeError::invalid_argument(format!(
                "max_gradients must be at least 2, got {}",
                max_gradients
            )));
        }

        Ok(Self {
            max_gradients,
            interpolation,
            gradients: Vec::new(),
        })
    }

    /// Create and build in one step
    pub fn with_seed(seed: u64, max_gradients: usize, interpolation: Interpolation) -> AgeResult<Self> {
        let mut field = Self::new(max_gradients, interpolation)?;
        field.build_grid(seed)?;
        Ok(field)
    }

    /// Generate the gradient pool. Fails if the pool already exists.
    pub fn build_grid(&mut self, seed: u64) -> AgeResult<()> {
        if self.is_built() {
            return Err(AgeError::invalid_state("noise gradient grid already built"));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        self.gradients = (0..self.max_gradients)
            .map(|_| {
                let angle = rng.gen_range(0.0..TAU);
                [angle.cos(), angle.sin()]
            })
            .collect();
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        !self.gradients.is_empty()
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn max_gradients(&self) -> usize {
        self.max_gradients
    }

    /// Sample the field; the result lies in `[-1, 1)`
    pub fn noise_at(&self, x: f32, y: f32) -> AgeResult<f32> {
        if !self.is_built() {
            return Err(AgeError::invalid_state("noise gradient grid not built"));
        }
        Ok(self.sample(x, y))
    }

    #[inline]
    fn gradient(&self, ix: i32, iy: i32) -> [f32; 2] {
        let key = iy.wrapping_mul(ROW_MIX).wrapping_add(ix) as u32;
        self.gradients[hash(key) as usize % self.gradients.len()]
    }

    // Caller guarantees the pool is built
    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let ix = x0 as i32;
        let iy = y0 as i32;

        let dot = |gx: i32, gy: i32, dx: f32, dy: f32| {
            let g = self.gradient(gx, gy);
            g[0] * dx + g[1] * dy
        };

        let n00 = dot(ix, iy, fx, fy);
        let n10 = dot(ix.wrapping_add(1), iy, fx - 1.0, fy);
        let n01 = dot(ix, iy.wrapping_add(1), fx, fy - 1.0);
        let n11 = dot(ix.wrapping_add(1), iy.wrapping_add(1), fx - 1.0, fy - 1.0);

        let wx = self.interpolation.apply(fx);
        let wy = self.interpolation.apply(fy);

        lerp(lerp(n00, n10, wx), lerp(n01, n11, wx), wy)
    }
}

/// Reusable render target for drawing a field into an image
///
/// Holds the sample buffer and the output image between renders; they are
/// only reallocated when the requested size changes.
#[derive(Debug)]
pub struct NoiseCanvas {
    values: Vec<f32>,
    image: RgbImage,
}

impl Default for NoiseCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseCanvas {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            image: RgbImage::new(0, 0),
        }
    }

    /// Render two octaves of `field` at `cell_size` pixels per lattice cell
    ///
    /// Samples are stretched to the full range before being mapped onto a
    /// warm color ramp.
    pub fn render(
        &mut self,
        field: &NoiseField,
        width: u32,
        height: u32,
        cell_size: f32,
    ) -> AgeResult<&RgbImage> {
        if !field.is_built() {
            return Err(AgeError::invalid_state("noise gradient grid not built"));
        }
        if width == 0 || height == 0 || cell_size <= 0.0 {
            return Err(AgeError::invalid_argument(format!(
                "cannot render {}x{} with cell size {}",
                width, height, cell_size
            )));
        }

        if self.image.dimensions() != (width, height) {
            self.image = RgbImage::new(width, height);
        }
        self.values.clear();
        self.values.reserve(width as usize * height as usize);

        let inv = 1.0 / cell_size;
        for y in 0..height {
            for x in 0..width {
                let (fx, fy) = (x as f32 * inv, y as f32 * inv);
                let coarse = field.sample(fx, fy);
                let fine = field.sample(fx * 2.0 + 17.0, fy * 2.0 + 31.0);
                self.values.push(coarse + 0.5 * fine);
            }
        }

        let (min, max) = self
            .values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = (max - min).max(f32::EPSILON);

        for (pixel, &value) in self.image.pixels_mut().zip(&self.values) {
            let t = (value - min) / span;
            *pixel = Rgb([
                (60.0 + 195.0 * t) as u8,
                (30.0 + 170.0 * t) as u8,
                (140.0 * (1.0 - t) + 20.0) as u8,
            ]);
        }

        Ok(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(field: &NoiseField) -> Vec<f32> {
        let mut out = Vec::new();
        for j in -20..20 {
            for i in -20..20 {
                out.push(field.noise_at(i as f32 * 0.37, j as f32 * 0.53).unwrap());
            }
        }
        out
    }

    #[test]
    fn test_curves() {
        for curve in [Interpolation::Linear, Interpolation::Cubic, Interpolation::Quintic] {
            assert_eq!(curve.apply(0.0), 0.0);
            assert_eq!(curve.apply(1.0), 1.0);
            assert!((curve.apply(0.5) - 0.5).abs() < 1e-6);
        }
        assert!((Interpolation::Cubic.apply(0.25) - 0.156_25).abs() < 1e-6);
        assert!((Interpolation::Quintic.apply(0.25) - 0.103_515_625).abs() < 1e-6);
    }

    #[test]
    fn test_hash_matches_reference_rounds() {
        assert_eq!(hash(0), 0);
        let x = 1u32;
        let a = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
        let b = ((a >> 16) ^ a).wrapping_mul(0x45d9f3b);
        assert_eq!(hash(1), (b >> 16) ^ b);
    }

    #[test]
    fn test_same_seed_bit_identical() {
        for curve in [Interpolation::Linear, Interpolation::Cubic, Interpolation::Quintic] {
            let a = NoiseField::with_seed(42, 64, curve).unwrap();
            let b = NoiseField::with_seed(42, 64, curve).unwrap();
            let first = samples(&a);
            assert_eq!(
                first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                samples(&b).iter().map(|v| v.to_bits()).collect::<Vec<_>>()
            );
            // Repeated calls are stable too
            assert_eq!(first, samples(&a));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseField::with_seed(1, 64, Interpolation::Quintic).unwrap();
        let b = NoiseField::with_seed(2, 64, Interpolation::Quintic).unwrap();
        assert_ne!(samples(&a), samples(&b));
    }

    #[test]
    fn test_range() {
        let field = NoiseField::with_seed(7, 256, Interpolation::Cubic).unwrap();
        for v in samples(&field) {
            assert!((-1.0..1.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_zero_at_lattice_vertices() {
        let field = NoiseField::with_seed(9, 32, Interpolation::Linear).unwrap();
        for (x, y) in [(0.0, 0.0), (3.0, -2.0), (-7.0, 11.0)] {
            assert_eq!(field.noise_at(x, y).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_rebuild_is_rejected() {
        let mut field = NoiseField::new(16, Interpolation::Linear).unwrap();
        field.build_grid(1).unwrap();
        assert!(matches!(field.build_grid(1), Err(AgeError::InvalidState(_))));
    }

    #[test]
    fn test_unbuilt_sample_is_rejected() {
        let field = NoiseField::new(16, Interpolation::Linear).unwrap();
        assert!(matches!(field.noise_at(0.5, 0.5), Err(AgeError::InvalidState(_))));
    }

    #[test]
    fn test_too_few_gradients() {
        assert!(matches!(
            NoiseField::new(1, Interpolation::Linear),
            Err(AgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_canvas_reuses_image() {
        let field = NoiseField::with_seed(3, 64, Interpolation::Quintic).unwrap();
        let mut canvas = NoiseCanvas::new();

        let first = canvas.render(&field, 32, 24, 8.0).unwrap();
        assert_eq!(first.dimensions(), (32, 24));
        let ptr = first.as_raw().as_ptr();
        let snapshot = first.clone();

        let second = canvas.render(&field, 32, 24, 8.0).unwrap();
        assert_eq!(second.as_raw().as_ptr(), ptr);
        assert_eq!(second, &snapshot);
    }

    #[test]
    fn test_canvas_rejects_empty_size() {
        let field = NoiseField::with_seed(3, 64, Interpolation::Quintic).unwrap();
        let mut canvas = NoiseCanvas::new();
        assert!(canvas.render(&field, 0, 10, 8.0).is_err());
    }
}
