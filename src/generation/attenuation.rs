//! Post-pass shaping that fades the generated field toward empty.
//!
//! Every policy yields a keep factor `t` in [0, 1] per voxel. Solidity is
//! blended toward fully empty as `lerp(-1, s, t)` and never increased.

use serde::{Deserialize, Serialize};

use crate::core::types::{Vec2, Vec3, VoxelCoord};

/// Where the top fade ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TopHeight {
    /// The top voxel layer.
    #[default]
    GridTop,
    /// The external surface height, falling back to the grid top.
    Surface,
    /// Low-frequency random height below the grid top.
    Random {
        /// Lattice spacing in voxels.
        period: f32,
        /// Maximum depth below the top, in voxels.
        amplitude: f32,
    },
}

/// Sphere fade variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum SphereMode {
    /// Fade reaches zero at the radius.
    #[default]
    Clamp,
    /// Fade starts at the radius and reaches zero one band further out.
    OutsideOnly,
    /// As `OutsideOnly`, but below the centre only horizontal distance counts.
    OutsideNoBottomTaper,
}

/// Attenuation policy applied after noise evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Attenuation {
    #[default]
    None,
    /// Fade to empty over `band` voxels below the top height.
    Top { band: f32, height: TopHeight },
    /// Fade to empty over `band` voxels at the grid sides and top, and the
    /// bottom when `include_bottom` is set.
    Edges { band: f32, include_bottom: bool },
    /// Fade outside a sphere. `radius` and `band` are in normalised grid
    /// units where 1.0 reaches the middle of each face.
    Sphere { radius: f32, band: f32, mode: SphereMode },
}

impl Attenuation {
    /// Keep factor for voxel `c`. `ceiling` is the top height in voxel units
    /// for the voxel's column (only used by `Top`).
    pub fn factor(&self, c: VoxelCoord, dims: [usize; 3], ceiling: f32) -> f32 {
        match *self {
            Attenuation::None => 1.0,
            Attenuation::Top { band, .. } => ramp(ceiling - c[2] as f32, band),
            Attenuation::Edges { band, include_bottom } => {
                let tx = ramp(dist_to_faces(c[0], dims[0]), band);
                let ty = ramp(dist_to_faces(c[1], dims[1]), band);
                let top = (dims[2] - 1 - c[2]) as f32;
                let tz = if include_bottom {
                    ramp(top.min(c[2] as f32), band)
                } else {
                    ramp(top, band)
                };
                tx * ty * tz
            }
            Attenuation::Sphere { radius, band, mode } => {
                let half = Vec3::new(
                    (dims[0] - 1) as f32 * 0.5,
                    (dims[1] - 1) as f32 * 0.5,
                    (dims[2] - 1) as f32 * 0.5,
                )
                .max(Vec3::splat(0.5));
                let p = (Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32) - half) / half;
                match mode {
                    SphereMode::Clamp => ramp(radius - p.length(), band),
                    SphereMode::OutsideOnly => ramp(radius + band - p.length(), band),
                    SphereMode::OutsideNoBottomTaper => {
                        let r = if p.z < 0.0 {
                            Vec2::new(p.x, p.y).length()
                        } else {
                            p.length()
                        };
                        ramp(radius + band - r, band)
                    }
                }
            }
        }
    }

    /// Apply the factor to a solidity value.
    pub fn attenuate(solidity: f32, factor: f32) -> f32 {
        if factor >= 1.0 {
            return solidity;
        }
        let faded = -1.0 + (solidity + 1.0) * factor.max(0.0);
        faded.min(solidity)
    }
}

/// 0 at `d <= 0`, 1 at `d >= band`.
fn ramp(d: f32, band: f32) -> f32 {
    if band <= 0.0 {
        return if d > 0.0 { 1.0 } else { 0.0 };
    }
    (d / band).clamp(0.0, 1.0)
}

fn dist_to_faces(i: usize, n: usize) -> f32 {
    i.min(n - 1 - i) as f32
}

/// Value-noise height lattice driven by an explicit RNG.
pub struct RandomHeights {
    period: f32,
    cols: usize,
    values: Vec<f32>,
}

impl RandomHeights {
    /// Lattice covering an `nx * ny` column grid, values in [0, 1].
    pub fn new(nx: usize, ny: usize, period: f32, rng: &mut fastrand::Rng) -> Self {
        let period = period.max(1.0);
        let cols = (nx as f32 / period).ceil() as usize + 2;
        let rows = (ny as f32 / period).ceil() as usize + 2;
        let values = (0..cols * rows).map(|_| rng.f32()).collect();
        Self { period, cols, values }
    }

    /// Bilinear lattice value at column (x, y).
    pub fn at(&self, x: usize, y: usize) -> f32 {
        let gx = x as f32 / self.period;
        let gy = y as f32 / self.period;
        let (ix, iy) = (gx.floor() as usize, gy.floor() as usize);
        let (fx, fy) = (gx - ix as f32, gy - iy as f32);
        let v = |i: usize, j: usize| self.values[i + self.cols * j];
        let a = v(ix, iy) * (1.0 - fx) + v(ix + 1, iy) * fx;
        let b = v(ix, iy + 1) * (1.0 - fx) + v(ix + 1, iy + 1) * fx;
        a * (1.0 - fy) + b * fy
    }
}
