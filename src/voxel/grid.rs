//! Dense 3D grid with a world-space transform.
//!
//! Storage is a single flat buffer addressed as `z + nz * (x + nx * y)`:
//! z varies fastest, then x, then y. Each y index therefore owns one
//! contiguous slab of `nx * nz` cells, which is what the parallel passes
//! split on.

use std::ops::{Index, IndexMut};

use crate::core::types::{Vec3, VoxelCoord};
use crate::math::{Aabb, VoxelBox};

/// Face-adjacent neighbour offsets
pub const FACE_NEIGHBORS: [[i32; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Generic dense voxel grid.
#[derive(Clone, Debug)]
pub struct Grid3D<T> {
    dims: [usize; 3],
    cell_size: Vec3,
    origin: Vec3,
    data: Vec<T>,
}

impl<T: Clone> Grid3D<T> {
    /// Allocate a grid filled with `fill`. `origin` is the world position of
    /// voxel (0, 0, 0).
    pub fn new(dims: [usize; 3], cell_size: Vec3, origin: Vec3, fill: T) -> Self {
        Self {
            dims,
            cell_size,
            origin,
            data: vec![fill; dims[0] * dims[1] * dims[2]],
        }
    }

    /// Allocate a grid with the same shape and transform as `other`.
    pub fn with_layout_of<U>(other: &Grid3D<U>, fill: T) -> Self {
        Self::new(other.dims, other.cell_size, other.origin, fill)
    }

    /// Discard all contents and reallocate with a new shape.
    pub fn reinit(&mut self, dims: [usize; 3], cell_size: Vec3, origin: Vec3, fill: T) {
        self.dims = dims;
        self.cell_size = cell_size;
        self.origin = origin;
        self.data.clear();
        self.data.resize(dims[0] * dims[1] * dims[2], fill);
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Grid3D<T> {
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    /// World position of voxel (0, 0, 0).
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// World position of the grid's geometric centre.
    pub fn center(&self) -> Vec3 {
        let span = Vec3::new(
            (self.dims[0] - 1) as f32,
            (self.dims[1] - 1) as f32,
            (self.dims[2] - 1) as f32,
        );
        self.origin + self.cell_size * span * 0.5
    }

    /// World bounds spanned by the voxel positions.
    pub fn bounds(&self) -> Aabb {
        let span = Vec3::new(
            (self.dims[0] - 1) as f32,
            (self.dims[1] - 1) as f32,
            (self.dims[2] - 1) as f32,
        );
        Aabb::new(self.origin, self.origin + self.cell_size * span)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of cells in one y slab.
    pub fn slab_len(&self) -> usize {
        self.dims[0] * self.dims[2]
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z + self.dims[2] * (x + self.dims[0] * y)
    }

    /// Inverse of [`Grid3D::index`].
    #[inline]
    pub fn coord_of(&self, index: usize) -> VoxelCoord {
        let z = index % self.dims[2];
        let rest = index / self.dims[2];
        let x = rest % self.dims[0];
        let y = rest / self.dims[0];
        [x, y, z]
    }

    pub fn in_bounds(&self, x: i64, y: i64, z: i64) -> bool {
        x >= 0 && y >= 0 && z >= 0
            && (x as usize) < self.dims[0]
            && (y as usize) < self.dims[1]
            && (z as usize) < self.dims[2]
    }

    /// True if the voxel lies on any of the six outer faces.
    pub fn is_boundary(&self, c: VoxelCoord) -> bool {
        (0..3).any(|a| c[a] == 0 || c[a] == self.dims[a] - 1)
    }

    /// `c + offset` if it stays inside the grid.
    #[inline]
    pub fn offset(&self, c: VoxelCoord, offset: [i32; 3]) -> Option<VoxelCoord> {
        let x = c[0] as i64 + offset[0] as i64;
        let y = c[1] as i64 + offset[1] as i64;
        let z = c[2] as i64 + offset[2] as i64;
        self.in_bounds(x, y, z).then(|| [x as usize, y as usize, z as usize])
    }

    /// In-grid face neighbours of `c`.
    pub fn face_neighbors(&self, c: VoxelCoord) -> impl Iterator<Item = VoxelCoord> + '_ {
        FACE_NEIGHBORS.iter().filter_map(move |o| self.offset(c, *o))
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        &self.data[self.index(x, y, z)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        let i = self.index(x, y, z);
        &mut self.data[i]
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// World position of a voxel.
    pub fn world_pos(&self, c: VoxelCoord) -> Vec3 {
        self.origin + self.cell_size * Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32)
    }

    /// Continuous grid-space coordinate of a world position.
    pub fn grid_pos(&self, pos: Vec3) -> Vec3 {
        (pos - self.origin) / self.cell_size
    }

    /// Nearest voxel to a world position, or None outside the grid.
    pub fn voxel_at(&self, pos: Vec3) -> Option<VoxelCoord> {
        let g = self.grid_pos(pos).round();
        if !g.is_finite() {
            return None;
        }
        self.in_bounds(g.x as i64, g.y as i64, g.z as i64)
            .then(|| [g.x as usize, g.y as usize, g.z as usize])
    }

    /// Voxels whose positions fall inside `aabb`, or None if there are none.
    pub fn voxel_box_for(&self, aabb: &Aabb) -> Option<VoxelBox> {
        let lo = self.grid_pos(aabb.min).ceil();
        let hi = self.grid_pos(aabb.max).floor();
        let mut min = [0usize; 3];
        let mut max = [0usize; 3];
        for a in 0..3 {
            let top = (self.dims[a] - 1) as f32;
            if hi[a] < 0.0 || lo[a] > top || lo[a] > hi[a] {
                return None;
            }
            min[a] = lo[a].max(0.0) as usize;
            max[a] = hi[a].min(top) as usize;
        }
        Some(VoxelBox::new(min, max))
    }

    /// World-space box of one voxel cell, centred on the voxel position.
    pub fn cell_bounds(&self, c: VoxelCoord) -> Aabb {
        Aabb::from_center_half_extent(self.world_pos(c), self.cell_size * 0.5)
    }
}

impl<T: Copy + Into<f32>> Grid3D<T> {
    /// Trilinear sample at a world position. None outside the grid.
    pub fn sample_trilinear(&self, pos: Vec3) -> Option<f32> {
        let g = self.grid_pos(pos);
        for a in 0..3 {
            if !(g[a] >= 0.0 && g[a] <= (self.dims[a] - 1) as f32) {
                return None;
            }
        }

        let mut base = [0usize; 3];
        let mut frac = [0.0f32; 3];
        for a in 0..3 {
            let cell = (g[a].floor() as usize).min(self.dims[a].saturating_sub(2));
            base[a] = cell;
            frac[a] = g[a] - cell as f32;
        }

        let mut result = 0.0;
        for corner in 0..8 {
            let dx = corner & 1;
            let dy = (corner >> 1) & 1;
            let dz = (corner >> 2) & 1;
            let x = (base[0] + dx).min(self.dims[0] - 1);
            let y = (base[1] + dy).min(self.dims[1] - 1);
            let z = (base[2] + dz).min(self.dims[2] - 1);
            let wx = if dx == 1 { frac[0] } else { 1.0 - frac[0] };
            let wy = if dy == 1 { frac[1] } else { 1.0 - frac[1] };
            let wz = if dz == 1 { frac[2] } else { 1.0 - frac[2] };
            result += wx * wy * wz * (*self.get(x, y, z)).into();
        }
        Some(result)
    }
}

impl<T> Index<VoxelCoord> for Grid3D<T> {
    type Output = T;

    #[inline]
    fn index(&self, c: VoxelCoord) -> &T {
        self.get(c[0], c[1], c[2])
    }
}

impl<T> IndexMut<VoxelCoord> for Grid3D<T> {
    #[inline]
    fn index_mut(&mut self, c: VoxelCoord) -> &mut T {
        self.get_mut(c[0], c[1], c[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid3D<f32> {
        Grid3D::new([4, 5, 6], Vec3::splat(2.0), Vec3::new(-1.0, 0.0, 10.0), 0.0)
    }

    #[test]
    fn test_flat_index_layout() {
        let g = grid();
        assert_eq!(g.index(0, 0, 1), 1);
        assert_eq!(g.index(1, 0, 0), 6);
        assert_eq!(g.index(0, 1, 0), 24);
        assert_eq!(g.index(3, 4, 5), 5 + 6 * (3 + 4 * 4));
        assert_eq!(g.len(), 120);
        assert_eq!(g.slab_len(), 24);
    }

    #[test]
    fn test_coord_of_inverts_index() {
        let g = grid();
        for i in 0..g.len() {
            let [x, y, z] = g.coord_of(i);
            assert_eq!(g.index(x, y, z), i);
        }
    }

    #[test]
    fn test_world_transform() {
        let g = grid();
        assert_eq!(g.world_pos([0, 0, 0]), Vec3::new(-1.0, 0.0, 10.0));
        assert_eq!(g.world_pos([1, 2, 3]), Vec3::new(1.0, 4.0, 16.0));
        assert_eq!(g.center(), Vec3::new(2.0, 4.0, 15.0));
        assert_eq!(g.voxel_at(Vec3::new(1.2, 3.4, 16.9)), Some([1, 2, 3]));
        assert_eq!(g.voxel_at(Vec3::new(-5.0, 0.0, 10.0)), None);
    }

    #[test]
    fn test_voxel_box_for() {
        let g = grid();
        let b = g.voxel_box_for(&Aabb::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(3.5, 100.0, 12.0)));
        assert_eq!(b, Some(VoxelBox::new([1, 0, 0], [2, 4, 1])));
        assert!(g.voxel_box_for(&Aabb::new(Vec3::splat(100.0), Vec3::splat(101.0))).is_none());
    }

    #[test]
    fn test_offset_and_neighbors() {
        let g = grid();
        assert_eq!(g.offset([0, 0, 0], [-1, 0, 0]), None);
        assert_eq!(g.offset([0, 0, 0], [1, 0, 0]), Some([1, 0, 0]));
        assert_eq!(g.face_neighbors([0, 0, 0]).count(), 3);
        assert_eq!(g.face_neighbors([1, 1, 1]).count(), 6);
    }

    #[test]
    fn test_reinit_clears() {
        let mut g = grid();
        g[[1, 1, 1]] = 5.0;
        g.reinit([2, 2, 2], Vec3::ONE, Vec3::ZERO, 1.0);
        assert_eq!(g.len(), 8);
        assert!(g.data().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_sample_trilinear() {
        let mut g: Grid3D<f32> = Grid3D::new([2, 2, 2], Vec3::ONE, Vec3::ZERO, 0.0);
        g[[1, 0, 0]] = 1.0;
        g[[1, 1, 0]] = 1.0;
        g[[1, 0, 1]] = 1.0;
        g[[1, 1, 1]] = 1.0;
        let v = g.sample_trilinear(Vec3::new(0.25, 0.5, 0.5)).unwrap();
        assert!((v - 0.25).abs() < 1e-6);
        assert_eq!(g.sample_trilinear(Vec3::new(1.0, 1.0, 1.0)), Some(1.0));
        assert!(g.sample_trilinear(Vec3::splat(1.5)).is_none());
    }

    #[test]
    fn test_sample_trilinear_u8() {
        let g: Grid3D<u8> = Grid3D::new([3, 3, 3], Vec3::ONE, Vec3::ZERO, 255);
        assert_eq!(g.sample_trilinear(Vec3::splat(1.3)), Some(255.0));
    }
}
