//! Axis-aligned bounding boxes in world space and in voxel index space

use crate::core::types::{Vec3, VoxelCoord};

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Tight box around a sphere
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self::from_center_half_extent(center, Vec3::splat(radius))
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if point is inside AABB (inclusive)
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two AABBs intersect
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Closest point of the box to `p`
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Sphere overlap test against the solid box
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.closest_point(center).distance_squared(center) <= radius * radius
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

/// Inclusive box of voxel indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoxelBox {
    pub min: VoxelCoord,
    pub max: VoxelCoord,
}

impl VoxelBox {
    pub fn new(min: VoxelCoord, max: VoxelCoord) -> Self {
        Self { min, max }
    }

    /// Box covering a whole grid of the given dimensions.
    pub fn whole(dims: [usize; 3]) -> Self {
        Self {
            min: [0, 0, 0],
            max: [dims[0] - 1, dims[1] - 1, dims[2] - 1],
        }
    }

    /// Number of voxels along each axis.
    pub fn extent(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }

    /// Voxel count.
    pub fn volume(&self) -> usize {
        let e = self.extent();
        e[0] * e[1] * e[2]
    }

    pub fn contains(&self, c: VoxelCoord) -> bool {
        (0..3).all(|a| c[a] >= self.min[a] && c[a] <= self.max[a])
    }

    /// Grow by `pad` voxels on the x/y axes (and z if `pad_z`), clamped to the grid.
    pub fn padded(&self, pad: usize, pad_z: bool, dims: [usize; 3]) -> Self {
        let mut out = *self;
        for a in 0..3 {
            if a == 2 && !pad_z {
                continue;
            }
            out.min[a] = self.min[a].saturating_sub(pad);
            out.max[a] = (self.max[a] + pad).min(dims[a] - 1);
        }
        out
    }

    pub fn overlaps(&self, other: &VoxelBox) -> bool {
        (0..3).all(|a| self.min[a] <= other.max[a] && self.max[a] >= other.min[a])
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &VoxelBox) -> Self {
        let mut out = *self;
        for a in 0..3 {
            out.min[a] = self.min[a].min(other.min[a]);
            out.max[a] = self.max[a].max(other.max[a]);
        }
        out
    }

    /// Iterate voxel coordinates in grid memory order (y, then x, then z).
    pub fn iter(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        (self.min[1]..=self.max[1]).flat_map(move |y| {
            (self.min[0]..=self.max[0]).flat_map(move |x| {
                (self.min[2]..=self.max[2]).map(move |z| [x, y, z])
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(aabb.contains_point(Vec3::ONE));
        assert!(!aabb.contains_point(Vec3::splat(2.0)));
    }

    #[test]
    fn test_intersects_sphere() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.intersects_sphere(Vec3::new(1.5, 0.5, 0.5), 0.6));
        assert!(!aabb.intersects_sphere(Vec3::new(1.5, 0.5, 0.5), 0.4));
        // Sphere centre inside the box always hits
        assert!(aabb.intersects_sphere(Vec3::splat(0.5), 0.01));
    }

    #[test]
    fn test_voxel_box_padded_clamps() {
        let b = VoxelBox::new([0, 4, 0], [3, 7, 9]);
        let p = b.padded(1, false, [8, 8, 10]);
        assert_eq!(p.min, [0, 3, 0]);
        assert_eq!(p.max, [4, 7, 9]);
    }

    #[test]
    fn test_voxel_box_union_and_overlap() {
        let a = VoxelBox::new([0, 0, 0], [4, 4, 4]);
        let b = VoxelBox::new([4, 0, 0], [8, 4, 4]);
        let c = VoxelBox::new([6, 6, 0], [8, 8, 4]);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        let u = a.union(&b);
        assert_eq!(u.volume(), 9 * 5 * 5);
    }

    #[test]
    fn test_voxel_box_iter_order() {
        let b = VoxelBox::new([0, 0, 0], [1, 1, 1]);
        let coords: Vec<_> = b.iter().collect();
        assert_eq!(coords.len(), 8);
        assert_eq!(coords[0], [0, 0, 0]);
        assert_eq!(coords[1], [0, 0, 1]);
        assert_eq!(coords[2], [1, 0, 0]);
        assert_eq!(coords[7], [1, 1, 1]);
    }
}
