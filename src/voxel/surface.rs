//! External ground height sources.
//!
//! The terrain can sit on top of a separate 2D height field (a heightmap
//! mesh owned by someone else). Voxels below that surface are tagged
//! `UNDER_SURFACE`; they count as ground anchors for pruning and are hidden
//! from meshing and lighting.

use crate::core::types::Vec2;

/// World-space ground height lookup.
pub trait SurfaceHeight: Send + Sync {
    /// Ground height at (x, y), or None where the surface does not exist.
    fn height_at(&self, x: f32, y: f32) -> Option<f32>;
}

/// Infinite flat ground plane.
#[derive(Clone, Copy, Debug)]
pub struct FlatSurface {
    pub height: f32,
}

impl FlatSurface {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl SurfaceHeight for FlatSurface {
    fn height_at(&self, _x: f32, _y: f32) -> Option<f32> {
        Some(self.height)
    }
}

/// Regular grid of height samples, bilinearly interpolated.
#[derive(Clone, Debug)]
pub struct HeightGrid {
    origin: Vec2,
    spacing: Vec2,
    dims: [usize; 2],
    heights: Vec<f32>,
}

impl HeightGrid {
    /// `heights` is row-major with x fastest: `heights[x + dims[0] * y]`.
    pub fn new(origin: Vec2, spacing: Vec2, dims: [usize; 2], heights: Vec<f32>) -> Self {
        debug_assert_eq!(heights.len(), dims[0] * dims[1]);
        Self { origin, spacing, dims, heights }
    }

    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn spacing(&self) -> Vec2 {
        self.spacing
    }

    /// Height stored at sample (ix, iy).
    pub fn sample(&self, ix: usize, iy: usize) -> f32 {
        self.heights[ix + self.dims[0] * iy]
    }
}

impl SurfaceHeight for HeightGrid {
    fn height_at(&self, x: f32, y: f32) -> Option<f32> {
        if self.dims[0] == 0 || self.dims[1] == 0 {
            return None;
        }
        let g = (Vec2::new(x, y) - self.origin) / self.spacing;
        let max = Vec2::new((self.dims[0] - 1) as f32, (self.dims[1] - 1) as f32);
        if !(g.x >= 0.0 && g.y >= 0.0 && g.x <= max.x && g.y <= max.y) {
            return None;
        }

        let x0 = (g.x.floor() as usize).min(self.dims[0].saturating_sub(2));
        let y0 = (g.y.floor() as usize).min(self.dims[1].saturating_sub(2));
        let x1 = (x0 + 1).min(self.dims[0] - 1);
        let y1 = (y0 + 1).min(self.dims[1] - 1);
        let fx = g.x - x0 as f32;
        let fy = g.y - y0 as f32;

        let a = self.sample(x0, y0) * (1.0 - fx) + self.sample(x1, y0) * fx;
        let b = self.sample(x0, y1) * (1.0 - fx) + self.sample(x1, y1) * fx;
        Some(a * (1.0 - fy) + b * fy)
    }
}
