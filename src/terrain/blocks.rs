//! Block layout, per-block meshing and AO baking.
//!
//! The grid is cut into columns of `block_size` cubes along x and y that
//! span the full z range. Neighbouring blocks share their boundary voxel
//! plane, so a voxel on a block edge belongs to up to four blocks.

use std::collections::BTreeSet;
use std::time::Instant;

use rayon::prelude::*;

use crate::core::types::{Vec3, VoxelCoord};
use crate::lighting::{apply_writes, AoConfig, OcclusionBaker, AO_LIT};
use crate::math::VoxelBox;
use crate::mesh::{BlockMesh, CubeRange, IsosurfaceMesher, SeamMap};
use crate::voxel::{Grid3D, ScalarField, VoxelFlags};

/// 2D block coordinate. Ordered row by row (y, then x), matching the slot
/// layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex {
    pub y: usize,
    pub x: usize,
}

impl BlockIndex {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Receives block meshes for physics.
pub trait ColliderSink: Send {
    /// The block's old meshes are gone.
    fn block_cleared(&mut self, block: BlockIndex);

    /// A fresh mesh for one LOD of the block.
    fn block_meshed(&mut self, block: BlockIndex, lod: usize, mesh: &BlockMesh);
}

/// Collider sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullColliders;

impl ColliderSink for NullColliders {
    fn block_cleared(&mut self, _block: BlockIndex) {}
    fn block_meshed(&mut self, _block: BlockIndex, _lod: usize, _mesh: &BlockMesh) {}
}

/// Owns block meshes, the seam map and the AO grid.
pub struct BlockManager {
    dims: [usize; 3],
    block_size: usize,
    lod_count: usize,
    num_blocks: [usize; 2],
    meshes: Vec<Vec<BlockMesh>>,
    seams: SeamMap,
    mesher: IsosurfaceMesher,
    baker: OcclusionBaker,
    ao: Grid3D<u8>,
    ao_baked: bool,
}

impl BlockManager {
    pub fn new(
        layout: &Grid3D<f32>,
        block_size: usize,
        lod_count: usize,
        remove_under_mesh: bool,
        ao: AoConfig,
    ) -> Self {
        let dims = layout.dims();
        let per_axis = |n: usize| (n - 1).div_ceil(block_size).max(1);
        let num_blocks = [per_axis(dims[0]), per_axis(dims[1])];
        let count = num_blocks[0] * num_blocks[1];
        Self {
            dims,
            block_size,
            lod_count,
            num_blocks,
            meshes: (0..count).map(|_| empty_lods(lod_count)).collect(),
            seams: SeamMap::new(),
            mesher: IsosurfaceMesher::new(remove_under_mesh),
            baker: OcclusionBaker::new(ao),
            ao: Grid3D::with_layout_of(layout, AO_LIT),
            ao_baked: false,
        }
    }

    pub fn num_blocks(&self) -> [usize; 2] {
        self.num_blocks
    }

    pub fn block_count(&self) -> usize {
        self.num_blocks[0] * self.num_blocks[1]
    }

    pub fn lod_count(&self) -> usize {
        self.lod_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Every block, in slot order.
    pub fn all_blocks(&self) -> Vec<BlockIndex> {
        let [nbx, nby] = self.num_blocks;
        (0..nby)
            .flat_map(|y| (0..nbx).map(move |x| BlockIndex::new(x, y)))
            .collect()
    }

    pub fn contains(&self, block: BlockIndex) -> bool {
        block.x < self.num_blocks[0] && block.y < self.num_blocks[1]
    }

    fn slot(&self, block: BlockIndex) -> usize {
        block.x + self.num_blocks[0] * block.y
    }

    /// Cube corners covered by `block`. The last block on an axis may be
    /// shorter than `block_size`.
    pub fn cube_range(&self, block: BlockIndex) -> CubeRange {
        let x0 = block.x * self.block_size;
        let y0 = block.y * self.block_size;
        CubeRange {
            x0,
            x1: (x0 + self.block_size).min(self.dims[0] - 1),
            y0,
            y1: (y0 + self.block_size).min(self.dims[1] - 1),
        }
    }

    /// Voxels owned by `block` for baking. Ownership is disjoint: the shared
    /// upper plane goes to the next block, except on the last one.
    pub fn voxel_range(&self, block: BlockIndex) -> VoxelBox {
        let r = self.cube_range(block);
        let x_max = if block.x + 1 == self.num_blocks[0] { r.x1 } else { r.x1 - 1 };
        let y_max = if block.y + 1 == self.num_blocks[1] { r.y1 } else { r.y1 - 1 };
        VoxelBox::new([r.x0, r.y0, 0], [x_max, y_max, self.dims[2] - 1])
    }

    /// Blocks whose cubes use voxel `c` as a corner.
    pub fn blocks_for_voxel(&self, c: VoxelCoord) -> Vec<BlockIndex> {
        let xs = self.axis_blocks(c[0], self.num_blocks[0]);
        let ys = self.axis_blocks(c[1], self.num_blocks[1]);
        let mut blocks = Vec::with_capacity(4);
        for &y in &ys {
            for &x in &xs {
                blocks.push(BlockIndex::new(x, y));
            }
        }
        blocks
    }

    fn axis_blocks(&self, v: usize, count: usize) -> Vec<usize> {
        let primary = (v / self.block_size).min(count - 1);
        let mut out = vec![primary];
        if v % self.block_size == 0 && v > 0 {
            let lower = v / self.block_size - 1;
            if lower < count && lower != primary {
                out.push(lower);
            }
        }
        out
    }

    /// Add the owners of every voxel in `voxels` to `dirty`. Ownership only
    /// depends on the column, so each (x, y) is looked up once.
    pub fn mark_voxels(
        &self,
        voxels: impl IntoIterator<Item = VoxelCoord>,
        dirty: &mut BTreeSet<BlockIndex>,
    ) {
        let columns: BTreeSet<(usize, usize)> = voxels.into_iter().map(|c| (c[0], c[1])).collect();
        for (x, y) in columns {
            dirty.extend(self.blocks_for_voxel([x, y, 0]));
        }
    }

    pub fn mesh(&self, block: BlockIndex, lod: usize) -> Option<&BlockMesh> {
        if !self.contains(block) {
            return None;
        }
        self.meshes[self.slot(block)].get(lod)
    }

    pub fn seams(&self) -> &SeamMap {
        &self.seams
    }

    pub fn ao_grid(&self) -> &Grid3D<u8> {
        &self.ao
    }

    pub fn ao_baked(&self) -> bool {
        self.ao_baked
    }

    /// Interpolated AO in [0, 1] at a world position. 1.0 outside the grid
    /// or before the first bake.
    pub fn ao_value(&self, pos: Vec3) -> f32 {
        if !self.ao_baked {
            return 1.0;
        }
        self.ao
            .sample_trilinear(pos)
            .map_or(1.0, |v| v / AO_LIT as f32)
    }

    /// Triangle totals per LOD over all blocks.
    pub fn triangles_per_lod(&self) -> Vec<usize> {
        (0..self.lod_count)
            .map(|lod| self.meshes.iter().map(|m| m[lod].triangle_count()).sum())
            .collect()
    }

    /// Re-mesh and re-bake `blocks`.
    ///
    /// Meshing and AO run in parallel, one worker per block and LOD; seam
    /// normals are reconciled once every block is installed. With
    /// `ao_increase_only` the AO pass only brightens voxels, which is exact
    /// when material was removed and nothing added.
    pub fn rebuild(
        &mut self,
        field: &ScalarField,
        flags: &Grid3D<VoxelFlags>,
        blocks: &[BlockIndex],
        ao_increase_only: bool,
        colliders: &mut dyn ColliderSink,
    ) {
        if blocks.is_empty() {
            return;
        }
        let start = Instant::now();

        for &block in blocks {
            let slot = self.slot(block);
            colliders.block_cleared(block);
            self.seams.remove_block(slot);
            self.meshes[slot] = empty_lods(self.lod_count);
        }

        let jobs: Vec<(BlockIndex, usize)> = blocks
            .iter()
            .flat_map(|&b| (0..self.lod_count).map(move |lod| (b, lod)))
            .collect();
        let mesher = self.mesher;
        let built: Vec<(BlockIndex, usize, BlockMesh)> = jobs
            .par_iter()
            .map(|&(block, lod)| {
                let mut mesh = mesher.mesh_block(field, flags, self.cube_range(block), lod);
                mesh.finalize();
                (block, lod, mesh)
            })
            .collect();

        for (block, lod, mesh) in built {
            let slot = self.slot(block);
            self.seams.insert(slot, lod, &mesh);
            self.meshes[slot][lod] = mesh;
        }
        let seam_count = self.seams.finalize_boundary_vmap(&mut self.meshes);

        if self.baker.config().enabled {
            let increase_only = ao_increase_only && self.ao_baked;
            let writes: Vec<Vec<(usize, u8)>> = blocks
                .par_iter()
                .map(|&b| self.baker.bake_block(flags, &self.ao, &self.voxel_range(b), increase_only))
                .collect();
            for w in &writes {
                apply_writes(&mut self.ao, w);
            }
            if blocks.len() == self.block_count() {
                self.ao_baked = true;
            }
        }

        for &block in blocks {
            let slot = self.slot(block);
            for (lod, mesh) in self.meshes[slot].iter().enumerate() {
                colliders.block_meshed(block, lod, mesh);
            }
        }

        log::debug!(
            "Rebuilt {} blocks x {} LODs in {:.1}ms ({} seam positions reconciled)",
            blocks.len(),
            self.lod_count,
            start.elapsed().as_secs_f64() * 1000.0,
            seam_count
        );
    }
}

fn empty_lods(lod_count: usize) -> Vec<BlockMesh> {
    (0..lod_count).map(|_| BlockMesh::new()).collect()
}
