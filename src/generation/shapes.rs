//! Rasterising solid volumes into the field

use rayon::prelude::*;

use crate::core::types::{Vec2, Vec3};
use crate::math::Aabb;
use crate::voxel::ScalarField;

/// Solid primitive centred on its local origin, with `z` up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolidShape {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Rounded rod between `-half_length * dir` and `half_length * dir`.
    Capsule { radius: f32, half_length: f32, dir: Vec3 },
    /// Upright pillar.
    Column { radius: f32, half_height: f32 },
}

impl SolidShape {
    /// Distance from `p` to the surface, positive inside the material.
    pub fn depth(&self, p: Vec3) -> f32 {
        match *self {
            SolidShape::Ball { radius } => radius - p.length(),
            SolidShape::Cuboid { half_extents } => {
                let gap = half_extents - p.abs();
                if gap.min_element() >= 0.0 {
                    gap.min_element()
                } else {
                    -gap.min(Vec3::ZERO).length()
                }
            }
            SolidShape::Capsule { radius, half_length, dir } => {
                let dir = dir.try_normalize().unwrap_or(Vec3::Z);
                let t = p.dot(dir).clamp(-half_length, half_length);
                radius - (p - dir * t).length()
            }
            SolidShape::Column { radius, half_height } => {
                let radial = radius - p.truncate().length();
                let vertical = half_height - p.z.abs();
                if radial >= 0.0 && vertical >= 0.0 {
                    radial.min(vertical)
                } else {
                    -Vec2::new(radial.min(0.0), vertical.min(0.0)).length()
                }
            }
        }
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.depth(p) >= 0.0
    }

    /// Tight box around the shape in its local frame.
    pub fn local_bounds(&self) -> Aabb {
        let half = match *self {
            SolidShape::Ball { radius } => Vec3::splat(radius),
            SolidShape::Cuboid { half_extents } => half_extents,
            SolidShape::Capsule { radius, half_length, dir } => {
                let dir = dir.try_normalize().unwrap_or(Vec3::Z);
                dir.abs() * half_length + Vec3::splat(radius)
            }
            SolidShape::Column { radius, half_height } => Vec3::new(radius, radius, half_height),
        };
        Aabb::from_center_half_extent(Vec3::ZERO, half)
    }
}

/// A shape positioned in world space.
#[derive(Debug, Clone, Copy)]
pub struct PlacedShape {
    pub shape: SolidShape,
    pub center: Vec3,
}

impl PlacedShape {
    pub fn new(shape: SolidShape, center: Vec3) -> Self {
        Self { shape, center }
    }

    pub fn world_bounds(&self) -> Aabb {
        let local = self.shape.local_bounds();
        Aabb::new(local.min + self.center, local.max + self.center)
    }

    pub fn contains(&self, world: Vec3) -> bool {
        self.shape.contains_point(world - self.center)
    }

    /// Fraction of `samples^3` sub-points of the cell around `pos` that lie
    /// inside the shape.
    pub fn coverage(&self, pos: Vec3, cell: Vec3, samples: usize) -> f32 {
        let n = samples.max(1);
        let step = cell / n as f32;
        let start = pos - cell * 0.5 + step * 0.5;
        let mut inside = 0usize;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let p = start + step * Vec3::new(i as f32, j as f32, k as f32);
                    if self.contains(p) {
                        inside += 1;
                    }
                }
            }
        }
        inside as f32 / (n * n * n) as f32
    }
}

/// Raise the field inside `shapes` to `coverage * fill_value` solidity.
///
/// Each voxel takes the maximum of its current solidity and every shape's
/// contribution, so overlapping shapes do not add up. Runs one y slab per
/// worker.
pub fn create_from_bounding_shapes(
    field: &mut ScalarField,
    shapes: &[PlacedShape],
    fill_value: f32,
    samples: usize,
) {
    let start = std::time::Instant::now();
    let [nx, _, nz] = field.dims();
    let origin = field.grid().origin();
    let cell = field.grid().cell_size();
    let slab = field.grid().slab_len();
    let iso = field.isolevel();
    let dir = field.solid_direction();
    let bounds: Vec<Aabb> = shapes
        .iter()
        .map(|s| {
            let b = s.world_bounds();
            Aabb::new(b.min - cell * 0.5, b.max + cell * 0.5)
        })
        .collect();

    let touched: usize = field
        .grid_mut()
        .data_mut()
        .par_chunks_mut(slab)
        .enumerate()
        .map(|(y, slab)| {
            let mut touched = 0;
            for x in 0..nx {
                for z in 0..nz {
                    let pos = origin + cell * Vec3::new(x as f32, y as f32, z as f32);
                    let mut best = f32::NEG_INFINITY;
                    for (shape, b) in shapes.iter().zip(&bounds) {
                        if !b.contains_point(pos) {
                            continue;
                        }
                        let cover = shape.coverage(pos, cell, samples);
                        if cover > 0.0 {
                            best = best.max(cover * fill_value);
                        }
                    }
                    if best > f32::NEG_INFINITY {
                        let v = &mut slab[z + nz * x];
                        let current = (*v - iso) * dir;
                        if best > current {
                            *v = iso + best * dir;
                            touched += 1;
                        }
                    }
                }
            }
            touched
        })
        .sum();

    log::info!(
        "Rasterised {} shapes into {} voxels in {:.1}ms",
        shapes.len(),
        touched,
        start.elapsed().as_secs_f64() * 1000.0
    );
}
