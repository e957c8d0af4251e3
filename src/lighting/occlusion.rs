//! Ray-marched ambient occlusion per voxel.
//!
//! Each voxel casts a short ray along the 26 grid directions and records how
//! far it got before hitting an occluder. Results are stored as bytes where
//! 255 means fully lit.

use serde::{Deserialize, Serialize};

use crate::core::types::IVec3;
use crate::math::VoxelBox;
use crate::voxel::{Grid3D, VoxelFlags};

/// Ambient occlusion settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AoConfig {
    pub enabled: bool,
    /// Ray length in voxels
    pub radius: f32,
    /// Exponent applied to the averaged openness
    pub attenuation: f32,
    /// Compute every `stride` voxels and copy the result to the rest
    pub stride: usize,
}

impl Default for AoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 4.0,
            attenuation: 1.0,
            stride: 1,
        }
    }
}

/// Fully lit AO value
pub const AO_LIT: u8 = 255;

/// One ray direction with its step budget.
#[derive(Clone, Copy, Debug)]
struct Direction {
    step: IVec3,
    max_steps: usize,
}

pub struct OcclusionBaker {
    config: AoConfig,
    directions: Vec<Direction>,
    /// Furthest a ray gets along any one axis.
    reach: usize,
}

impl OcclusionBaker {
    pub fn new(config: AoConfig) -> Self {
        let mut directions = Vec::with_capacity(26);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let step = IVec3::new(dx, dy, dz);
                    let len = step.as_vec3().length();
                    let max_steps = ((config.radius / len).ceil() as usize).max(1);
                    directions.push(Direction { step, max_steps });
                }
            }
        }
        let reach = directions.iter().map(|d| d.max_steps).max().unwrap_or(1);
        Self { config, directions, reach }
    }

    pub fn config(&self) -> &AoConfig {
        &self.config
    }

    /// Compute AO for the voxels of `range`.
    ///
    /// Returns `(flat index, value)` writes instead of mutating `ao` so blocks
    /// can be baked concurrently and applied afterwards. With `increase_only`
    /// voxels already at [`AO_LIT`] are skipped and no value is lowered.
    ///
    /// Voxels higher than every occluder within ray reach are written as
    /// [`AO_LIT`] without casting, which is exactly what [`Self::sample`]
    /// would return for them.
    pub fn bake_block(
        &self,
        flags: &Grid3D<VoxelFlags>,
        ao: &Grid3D<u8>,
        range: &VoxelBox,
        increase_only: bool,
    ) -> Vec<(usize, u8)> {
        let stride = self.config.stride.max(1);
        let tops = ColumnTops::around(flags, range, self.reach);
        let mut writes = Vec::new();

        for y in range.min[1]..=range.max[1] {
            for x in range.min[0]..=range.max[0] {
                let top = tops.highest_near(x, y, self.reach);
                for z in range.min[2]..=range.max[2] {
                    let index = flags.index(x, y, z);
                    let above_terrain = top.is_none_or(|t| z > t + self.reach);
                    if above_terrain {
                        if !increase_only {
                            writes.push((index, AO_LIT));
                        }
                        continue;
                    }
                    if increase_only && ao.data()[index] == AO_LIT {
                        continue;
                    }

                    // Sub-sampled voxels copy the value of their stride anchor
                    let anchor = [
                        (x - x % stride).max(range.min[0]),
                        (y - y % stride).max(range.min[1]),
                        (z - z % stride).max(range.min[2]),
                    ];
                    let mut value = self.sample(flags, anchor);
                    if increase_only {
                        value = value.max(ao.data()[index]);
                    }
                    writes.push((index, value));
                }
            }
        }
        writes
    }

    /// AO byte for a single voxel.
    pub fn sample(&self, flags: &Grid3D<VoxelFlags>, c: [usize; 3]) -> u8 {
        let origin = IVec3::new(c[0] as i32, c[1] as i32, c[2] as i32);
        let mut open = 0.0f32;
        for dir in &self.directions {
            let mut reach = 1.0;
            for i in 0..dir.max_steps {
                let p = origin + dir.step * (i as i32 + 1);
                if !flags.in_bounds(p.x as i64, p.y as i64, p.z as i64) {
                    break;
                }
                if flags.get(p.x as usize, p.y as usize, p.z as usize).is_occluder() {
                    reach = i as f32 / dir.max_steps as f32;
                    break;
                }
            }
            open += reach;
        }
        let lit = (open / self.directions.len() as f32).powf(self.config.attenuation);
        (lit * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

fn highest_solid(flags: &Grid3D<VoxelFlags>, x: usize, y: usize) -> Option<usize> {
    let nz = flags.dims()[2];
    (0..nz).rev().find(|&z| flags.get(x, y, z).is_occluder())
}

/// Highest occluder per column over a block grown by the ray reach.
struct ColumnTops {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    tops: Vec<Option<usize>>,
}

impl ColumnTops {
    fn around(flags: &Grid3D<VoxelFlags>, range: &VoxelBox, reach: usize) -> Self {
        let dims = flags.dims();
        let x0 = range.min[0].saturating_sub(reach);
        let y0 = range.min[1].saturating_sub(reach);
        let x1 = (range.max[0] + reach).min(dims[0] - 1);
        let y1 = (range.max[1] + reach).min(dims[1] - 1);
        let tops = (y0..=y1)
            .flat_map(|y| (x0..=x1).map(move |x| (x, y)))
            .map(|(x, y)| highest_solid(flags, x, y))
            .collect();
        Self { x0, y0, x1, y1, tops }
    }

    fn highest_near(&self, x: usize, y: usize, reach: usize) -> Option<usize> {
        let width = self.x1 - self.x0 + 1;
        let xs = x.saturating_sub(reach).max(self.x0)..=(x + reach).min(self.x1);
        let ys = y.saturating_sub(reach).max(self.y0)..=(y + reach).min(self.y1);
        ys.flat_map(|ny| xs.clone().map(move |nx| (nx, ny)))
            .filter_map(|(nx, ny)| self.tops[(nx - self.x0) + width * (ny - self.y0)])
            .max()
    }
}

/// Apply writes produced by [`OcclusionBaker::bake_block`].
pub fn apply_writes(ao: &mut Grid3D<u8>, writes: &[(usize, u8)]) {
    let data = ao.data_mut();
    for &(index, value) in writes {
        data[index] = value;
    }
}
