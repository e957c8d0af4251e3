//! Per-voxel inside/outside classification

use rayon::prelude::*;

use crate::core::types::VoxelCoord;
use crate::math::VoxelBox;
use super::field::ScalarField;
use super::flags::VoxelFlags;
use super::grid::Grid3D;
use super::surface::SurfaceHeight;

/// Derives [`VoxelFlags`] from field values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Classifier {
    /// Force the outer shell of the grid empty so the mesh closes there.
    pub closed_surface: bool,
}

impl Classifier {
    pub fn new(closed_surface: bool) -> Self {
        Self { closed_surface }
    }

    /// Flags for one voxel given whether it lies under the external surface.
    #[inline]
    pub fn flags_for(&self, field: &ScalarField, c: VoxelCoord, under_surface: bool) -> VoxelFlags {
        let mut flags = VoxelFlags::SOLID;
        if self.closed_surface && field.grid().is_boundary(c) {
            flags.mark_on_edge();
        } else if !field.is_solid(c) {
            flags.set_outside(true);
        }
        flags.set_under_surface(under_surface);
        flags
    }

    /// Re-derive and store flags for a single voxel.
    pub fn classify(
        &self,
        field: &ScalarField,
        flags: &mut Grid3D<VoxelFlags>,
        c: VoxelCoord,
        surface: Option<&dyn SurfaceHeight>,
    ) -> VoxelFlags {
        let under = under_surface(field, c, surface);
        let f = self.flags_for(field, c, under);
        flags[c] = f;
        f
    }

    /// Re-classify every voxel in `region`.
    pub fn classify_box(
        &self,
        field: &ScalarField,
        flags: &mut Grid3D<VoxelFlags>,
        region: &VoxelBox,
        surface: Option<&dyn SurfaceHeight>,
    ) {
        for y in region.min[1]..=region.max[1] {
            for x in region.min[0]..=region.max[0] {
                let height = column_height(field, x, y, surface);
                for z in region.min[2]..=region.max[2] {
                    let c = [x, y, z];
                    let under = is_below(field, z, height);
                    flags[c] = self.flags_for(field, c, under);
                }
            }
        }
    }

    /// Re-classify the whole grid, one y slab per worker.
    pub fn classify_all(
        &self,
        field: &ScalarField,
        flags: &mut Grid3D<VoxelFlags>,
        surface: Option<&dyn SurfaceHeight>,
    ) {
        let [nx, _, nz] = field.dims();
        let slab = flags.slab_len();
        flags
            .data_mut()
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(y, slab)| {
                for x in 0..nx {
                    let height = column_height(field, x, y, surface);
                    for z in 0..nz {
                        let under = is_below(field, z, height);
                        slab[z + nz * x] = self.flags_for(field, [x, y, z], under);
                    }
                }
            });
    }
}

/// Ground height above voxel column (x, y), if a surface is present there.
pub fn column_height(
    field: &ScalarField,
    x: usize,
    y: usize,
    surface: Option<&dyn SurfaceHeight>,
) -> Option<f32> {
    let surface = surface?;
    let p = field.grid().world_pos([x, y, 0]);
    surface.height_at(p.x, p.y)
}

#[inline]
fn is_below(field: &ScalarField, z: usize, height: Option<f32>) -> bool {
    match height {
        Some(h) => {
            let grid = field.grid();
            grid.origin().z + grid.cell_size().z * (z as f32) < h
        }
        None => false,
    }
}

fn under_surface(field: &ScalarField, c: VoxelCoord, surface: Option<&dyn SurfaceHeight>) -> bool {
    is_below(field, c[2], column_height(field, c[0], c[1], surface))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::voxel::surface::FlatSurface;

    fn random_field(seed: u64, iso: f32, invert: bool) -> ScalarField {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut field = ScalarField::new([9, 7, 5], Vec3::ONE, Vec3::ZERO, iso, invert);
        for v in field.grid_mut().data_mut() {
            *v = rng.f32() * 2.0 - 1.0;
        }
        field
    }

    #[test]
    fn test_classification_matches_isolevel_rule() {
        for invert in [false, true] {
            let mut field = random_field(7, 0.1, invert);
            // Exact ties must classify as empty regardless of invert
            field.set_value([3, 3, 3], 0.1);
            field.set_value([4, 2, 1], 0.1);

            let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
            let classifier = Classifier::new(false);
            classifier.classify_all(&field, &mut flags, None);

            for i in 0..field.grid().len() {
                let c = field.grid().coord_of(i);
                let v = field.value(c);
                let solid = if invert { v < 0.1 } else { v > 0.1 };
                assert_eq!(flags[c].is_outside(), !solid, "voxel {:?} value {}", c, v);
            }
            assert!(flags[[3, 3, 3]].is_outside());
        }
    }

    #[test]
    fn test_classify_order_independent() {
        let field = random_field(11, 0.0, false);
        let classifier = Classifier::new(true);
        let mut a = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        let mut b = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        classifier.classify_all(&field, &mut a, None);
        for i in (0..field.grid().len()).rev() {
            let c = field.grid().coord_of(i);
            classifier.classify(&field, &mut b, c, None);
        }
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_closed_surface_marks_edges() {
        let mut field = ScalarField::new([4, 4, 4], Vec3::ONE, Vec3::ZERO, 0.0, false);
        field.grid_mut().fill(1.0);
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        Classifier::new(true).classify_all(&field, &mut flags, None);
        assert!(flags[[0, 2, 2]].is_on_edge());
        assert!(flags[[0, 2, 2]].is_outside());
        assert!(flags[[1, 1, 3]].is_on_edge());
        assert!(flags[[1, 2, 2]].is_solid());
    }

    #[test]
    fn test_under_surface_keeps_solidity() {
        let mut field = ScalarField::new([3, 3, 6], Vec3::ONE, Vec3::ZERO, 0.0, false);
        for y in 0..3 {
            for x in 0..3 {
                for z in 0..3 {
                    field.set_value([x, y, z], 1.0);
                }
            }
        }
        let surface = FlatSurface::new(1.5);
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        let classifier = Classifier::new(false);
        classifier.classify_all(&field, &mut flags, Some(&surface));

        assert!(flags[[1, 1, 1]].is_under_surface());
        assert!(flags[[1, 1, 1]].is_solid());
        assert!(!flags[[1, 1, 2]].is_under_surface());
        assert!(flags[[1, 1, 2]].is_solid());
        assert!(flags[[1, 1, 4]].is_outside());

        let mut boxed = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        classifier.classify_box(&field, &mut boxed, &VoxelBox::whole(field.dims()), Some(&surface));
        assert_eq!(flags.data(), boxed.data());
    }
}
