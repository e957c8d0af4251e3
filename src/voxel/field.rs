//! Scalar density field and its solid/empty rule

use crate::core::types::{Vec3, VoxelCoord};
use super::grid::Grid3D;

/// Density values on a grid, split into solid and empty by `isolevel`.
///
/// With `invert == false` a voxel is solid when its value is strictly greater
/// than the isolevel; with `invert == true` when strictly less. A value equal
/// to the isolevel is always empty.
#[derive(Clone, Debug)]
pub struct ScalarField {
    grid: Grid3D<f32>,
    isolevel: f32,
    invert: bool,
}

impl ScalarField {
    /// Create a field whose every voxel starts empty.
    pub fn new(dims: [usize; 3], cell_size: Vec3, origin: Vec3, isolevel: f32, invert: bool) -> Self {
        let empty = isolevel - if invert { -1.0 } else { 1.0 };
        Self {
            grid: Grid3D::new(dims, cell_size, origin, empty),
            isolevel,
            invert,
        }
    }

    pub fn grid(&self) -> &Grid3D<f32> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid3D<f32> {
        &mut self.grid
    }

    pub fn dims(&self) -> [usize; 3] {
        self.grid.dims()
    }

    pub fn isolevel(&self) -> f32 {
        self.isolevel
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    #[inline]
    pub fn value(&self, c: VoxelCoord) -> f32 {
        self.grid[c]
    }

    #[inline]
    pub fn set_value(&mut self, c: VoxelCoord, value: f32) {
        self.grid[c] = value;
    }

    /// +1 if larger values are more solid, -1 when inverted.
    #[inline]
    pub fn solid_direction(&self) -> f32 {
        if self.invert { -1.0 } else { 1.0 }
    }

    /// Solid-side test for a raw value. Ties are empty.
    #[inline]
    pub fn is_solid_value(&self, value: f32) -> bool {
        if self.invert {
            value < self.isolevel
        } else {
            value > self.isolevel
        }
    }

    #[inline]
    pub fn is_solid(&self, c: VoxelCoord) -> bool {
        self.is_solid_value(self.grid[c])
    }

    /// Signed distance from the isolevel, positive on the solid side.
    #[inline]
    pub fn solidity(&self, value: f32) -> f32 {
        (value - self.isolevel) * self.solid_direction()
    }

    /// Inverse of [`ScalarField::solidity`].
    #[inline]
    pub fn from_solidity(&self, solidity: f32) -> f32 {
        self.isolevel + solidity * self.solid_direction()
    }

    /// A value one unit into the empty side.
    pub fn empty_value(&self) -> f32 {
        self.from_solidity(-1.0)
    }

    /// Value `epsilon` into the empty side, used when removing material.
    pub fn nudged_empty(&self, epsilon: f32) -> f32 {
        self.from_solidity(-epsilon)
    }

    /// Value `epsilon` into the solid side, used when filling pockets.
    pub fn nudged_solid(&self, epsilon: f32) -> f32 {
        self.from_solidity(epsilon)
    }

    /// Count of solid voxels.
    pub fn solid_count(&self) -> usize {
        self.grid.data().iter().filter(|v| self.is_solid_value(**v)).count()
    }
}
