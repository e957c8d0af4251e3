//! Pluggable noise sources for field generation

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::core::types::Vec3;
use super::config::FieldParams;

/// Scalar noise evaluated at world positions, roughly in [-1, 1].
pub trait NoiseSampler: Sync {
    fn sample(&self, pos: Vec3) -> f32;
}

impl<F> NoiseSampler for F
where
    F: Fn(Vec3) -> f32 + Sync,
{
    fn sample(&self, pos: Vec3) -> f32 {
        self(pos)
    }
}

/// Fractal Brownian motion over Perlin noise
pub struct FbmSampler {
    noise: Fbm<Perlin>,
    scale: f32,
}

impl FbmSampler {
    pub fn new(seed: u32, octaves: u32, persistence: f32, lacunarity: f32, scale: f32) -> Self {
        let noise = Fbm::<Perlin>::new(seed)
            .set_octaves(octaves as usize)
            .set_persistence(persistence as f64)
            .set_lacunarity(lacunarity as f64);
        Self { noise, scale }
    }

    pub fn from_params(params: &FieldParams) -> Self {
        Self::new(
            params.seed,
            params.octaves,
            params.persistence,
            params.lacunarity,
            params.noise_scale,
        )
    }
}

impl NoiseSampler for FbmSampler {
    fn sample(&self, pos: Vec3) -> f32 {
        let p = pos / self.scale;
        self.noise.get([p.x as f64, p.y as f64, p.z as f64]) as f32
    }
}
