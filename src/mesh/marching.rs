//! Marching cubes over one block column

use std::collections::HashMap;

use crate::core::types::{Vec3, VoxelCoord};
use crate::voxel::{Grid3D, ScalarField, VoxelFlags};
use super::block_mesh::{BlockMesh, VertexKey, KEY_SCALE};
use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};

const EQUAL_EPSILON: f32 = 1e-5;

/// Cube range of one block: cube corners span `x0..=x1`, `y0..=y1` and the
/// full z extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CubeRange {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

/// Extracts the isosurface of a field block by block.
#[derive(Clone, Copy, Debug)]
pub struct IsosurfaceMesher {
    /// Skip cubes whose four base corners are all under the external surface.
    pub remove_under_mesh: bool,
}

impl IsosurfaceMesher {
    pub fn new(remove_under_mesh: bool) -> Self {
        Self { remove_under_mesh }
    }

    /// Mesh `range` at the given LOD. Corners are sampled every `1 << lod`
    /// voxels; the final cube on each axis is shortened to end on the range
    /// boundary. The result still needs [`BlockMesh::finalize`].
    pub fn mesh_block(
        &self,
        field: &ScalarField,
        flags: &Grid3D<VoxelFlags>,
        range: CubeRange,
        lod: usize,
    ) -> BlockMesh {
        let step = 1usize << lod;
        let nz = field.dims()[2];
        let grid = field.grid();
        let mut mesh = BlockMesh::new();
        let mut cache: HashMap<VertexKey, u32> = HashMap::new();

        let mut y = range.y0;
        while y < range.y1 {
            let y_hi = (y + step).min(range.y1);
            let mut x = range.x0;
            while x < range.x1 {
                let x_hi = (x + step).min(range.x1);
                let mut z = 0;
                while z + 1 < nz {
                    let z_hi = (z + step).min(nz - 1);
                    let corners = cube_corners([x, y, z], [x_hi, y_hi, z_hi]);
                    self.polygonise(field, flags, &corners, range, &mut cache, &mut mesh);
                    z = z_hi;
                }
                x = x_hi;
            }
            y = y_hi;
        }

        log::trace!(
            "Meshed cubes x {}..{} y {}..{} lod {}: {} triangles",
            range.x0, range.x1, range.y0, range.y1, lod, mesh.triangle_count()
        );
        debug_assert!(mesh.positions.iter().all(|p| grid.bounds().contains_point(*p)));
        mesh
    }

    fn polygonise(
        &self,
        field: &ScalarField,
        flags: &Grid3D<VoxelFlags>,
        corners: &[VoxelCoord; 8],
        range: CubeRange,
        cache: &mut HashMap<VertexKey, u32>,
        mesh: &mut BlockMesh,
    ) {
        if self.remove_under_mesh && corners[..4].iter().all(|c| flags[*c].is_under_surface()) {
            return;
        }

        let mut config = 0usize;
        for (i, c) in corners.iter().enumerate() {
            if flags[*c].is_outside() {
                config |= 1 << i;
            }
        }
        let edges = EDGE_TABLE[config];
        if edges == 0 {
            return;
        }

        let mut crossings = [Vec3::ZERO; 12];
        for (e, [a, b]) in EDGE_CONNECTIONS.iter().enumerate() {
            if edges & (1 << e) != 0 {
                crossings[e] = edge_crossing(field, flags, corners[*a], corners[*b]);
            }
        }

        let grid = field.grid();
        let origin = grid.origin();
        let cell = grid.cell_size();
        let tri = &TRI_TABLE[config];
        let mut i = 0;
        while tri[i] >= 0 {
            let g = [
                crossings[tri[i] as usize],
                crossings[tri[i + 1] as usize],
                crossings[tri[i + 2] as usize],
            ];
            i += 3;

            let keys = g.map(vertex_key);
            if keys[0] == keys[1] || keys[1] == keys[2] || keys[0] == keys[2] {
                continue;
            }
            let w = g.map(|p| origin + cell * p);
            let normal = (w[1] - w[0]).cross(w[2] - w[0]);
            if normal.length_squared() <= f32::EPSILON * f32::EPSILON {
                continue;
            }

            let mut ids = [0u32; 3];
            for k in 0..3 {
                ids[k] = *cache.entry(keys[k]).or_insert_with(|| {
                    let id = mesh.push_vertex(w[k]);
                    if on_block_boundary(keys[k], range) {
                        mesh.seam_vertices.push((keys[k], id));
                    }
                    id
                });
            }
            mesh.push_triangle(ids, normal);
        }
    }
}

fn cube_corners(lo: VoxelCoord, hi: VoxelCoord) -> [VoxelCoord; 8] {
    CORNER_OFFSETS.map(|o| {
        [
            if o[0] == 0 { lo[0] } else { hi[0] },
            if o[1] == 0 { lo[1] } else { hi[1] },
            if o[2] == 0 { lo[2] } else { hi[2] },
        ]
    })
}

/// Surface crossing on the edge between two corners, in grid space.
///
/// Endpoints are ordered by flat index so neighbouring blocks that share the
/// edge compute bit-identical positions.
fn edge_crossing(field: &ScalarField, flags: &Grid3D<VoxelFlags>, a: VoxelCoord, b: VoxelCoord) -> Vec3 {
    let grid = field.grid();
    let (a, b) = if grid.index(a[0], a[1], a[2]) <= grid.index(b[0], b[1], b[2]) {
        (a, b)
    } else {
        (b, a)
    };
    let iso = field.isolevel();
    let corner_value = |c: VoxelCoord| {
        if flags[c].is_on_edge() { iso } else { field.value(c) }
    };
    let (va, vb) = (corner_value(a), corner_value(b));
    let pa = Vec3::new(a[0] as f32, a[1] as f32, a[2] as f32);
    let pb = Vec3::new(b[0] as f32, b[1] as f32, b[2] as f32);

    if (iso - va).abs() < EQUAL_EPSILON {
        return pa;
    }
    if (iso - vb).abs() < EQUAL_EPSILON {
        return pb;
    }
    if (va - vb).abs() < EQUAL_EPSILON {
        return pa;
    }
    let t = (iso - va) / (vb - va);
    pa + (pb - pa) * t
}

#[inline]
fn vertex_key(grid_pos: Vec3) -> VertexKey {
    let k = (grid_pos * KEY_SCALE).round();
    [k.x as i64, k.y as i64, k.z as i64]
}

fn on_block_boundary(key: VertexKey, range: CubeRange) -> bool {
    let s = KEY_SCALE as i64;
    let planes_x = [range.x0 as i64 * s, range.x1 as i64 * s];
    let planes_y = [range.y0 as i64 * s, range.y1 as i64 * s];
    planes_x.contains(&key[0]) || planes_y.contains(&key[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::{Classifier, FlatSurface};

    fn classified(field: &ScalarField, closed: bool) -> Grid3D<VoxelFlags> {
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        Classifier::new(closed).classify_all(field, &mut flags, None);
        flags
    }

    fn slab_field() -> ScalarField {
        let mut field = ScalarField::new([16, 16, 16], Vec3::ONE, Vec3::ZERO, 0.0, false);
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            field.set_value(c, (8.0 - c[2] as f32).clamp(-1.0, 1.0));
        }
        field
    }

    fn whole(field: &ScalarField) -> CubeRange {
        let [nx, ny, _] = field.dims();
        CubeRange { x0: 0, x1: nx - 1, y0: 0, y1: ny - 1 }
    }

    #[test]
    fn test_slab_single_sheet() {
        let field = slab_field();
        let flags = classified(&field, false);
        let mut mesh = IsosurfaceMesher::new(false).mesh_block(&field, &flags, whole(&field), 0);
        mesh.finalize();

        assert_eq!(mesh.triangle_count(), 15 * 15 * 2);
        assert_eq!(mesh.vertex_count(), 16 * 16);
        assert!(mesh.positions.iter().all(|p| p.z == 8.0));
        for n in &mesh.normals {
            assert!((*n - Vec3::Z).length() < 1e-6, "normal {:?}", n);
        }
    }

    #[test]
    fn test_slab_inverted_same_sheet() {
        let mut field = ScalarField::new([16, 16, 16], Vec3::ONE, Vec3::ZERO, 0.0, true);
        for i in 0..field.grid().len() {
            let c = field.grid().coord_of(i);
            field.set_value(c, -(8.0 - c[2] as f32).clamp(-1.0, 1.0));
        }
        let flags = classified(&field, false);
        let mut mesh = IsosurfaceMesher::new(false).mesh_block(&field, &flags, whole(&field), 0);
        mesh.finalize();
        assert_eq!(mesh.triangle_count(), 450);
        assert!(mesh.normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-6));
    }

    #[test]
    fn test_lod_reduces_triangles() {
        let field = slab_field();
        let flags = classified(&field, false);
        let mesher = IsosurfaceMesher::new(false);
        let lod0 = mesher.mesh_block(&field, &flags, whole(&field), 0);
        let lod1 = mesher.mesh_block(&field, &flags, whole(&field), 1);
        assert!(lod1.triangle_count() < lod0.triangle_count());
        assert!(lod1.positions.iter().all(|p| (p.z - 8.0).abs() < 1e-5));
    }

    #[test]
    fn test_empty_and_full_fields_have_no_triangles() {
        let field = ScalarField::new([6, 6, 6], Vec3::ONE, Vec3::ZERO, 0.0, false);
        let flags = classified(&field, false);
        assert!(IsosurfaceMesher::new(false).mesh_block(&field, &flags, whole(&field), 0).is_empty());

        let mut full = field.clone();
        full.grid_mut().fill(1.0);
        let flags = classified(&full, false);
        assert!(IsosurfaceMesher::new(false).mesh_block(&full, &flags, whole(&full), 0).is_empty());
    }

    #[test]
    fn test_closed_surface_is_watertight() {
        let mut field = ScalarField::new([8, 8, 8], Vec3::ONE, Vec3::ZERO, 0.0, false);
        field.grid_mut().fill(1.0);
        let flags = classified(&field, true);
        let mesh = IsosurfaceMesher::new(false).mesh_block(&field, &flags, whole(&field), 0);
        assert!(!mesh.is_empty());
        assert!(mesh.positions.iter().all(|p| p.cmpge(Vec3::ZERO).all() && p.cmple(Vec3::splat(7.0)).all()));

        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for [a, b, c] in mesh.triangles() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edges.entry((u.min(v), u.max(v))).or_default() += 1;
            }
        }
        assert!(edges.values().all(|n| *n == 2));
    }

    #[test]
    fn test_remove_under_mesh() {
        let field = slab_field();
        let mut flags = Grid3D::with_layout_of(field.grid(), VoxelFlags::SOLID);
        let surface = FlatSurface::new(10.0);
        Classifier::new(false).classify_all(&field, &mut flags, Some(&surface));

        let kept = IsosurfaceMesher::new(false).mesh_block(&field, &flags, whole(&field), 0);
        let hidden = IsosurfaceMesher::new(true).mesh_block(&field, &flags, whole(&field), 0);
        assert_eq!(kept.triangle_count(), 450);
        assert!(hidden.is_empty());
    }

    #[test]
    fn test_seam_vertices_recorded() {
        let field = slab_field();
        let flags = classified(&field, false);
        let range = CubeRange { x0: 4, x1: 8, y0: 0, y1: 4 };
        let mesh = IsosurfaceMesher::new(false).mesh_block(&field, &flags, range, 0);
        assert_eq!(mesh.triangle_count(), 4 * 4 * 2);
        // Perimeter of a 5x5 vertex sheet
        assert_eq!(mesh.seam_vertices.len(), 16);
    }
}
