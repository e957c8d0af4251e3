//! Normal reconciliation across block boundaries.
//!
//! Each block accumulates normals from its own triangles only, so a vertex
//! duplicated on both sides of a block boundary would otherwise shade
//! differently on each side. The seam map remembers every copy of every
//! boundary vertex and, once all blocks of a pass are meshed, gives all
//! copies the same normalised sum.

use std::collections::{HashMap, HashSet};

use crate::core::types::Vec3;
use super::block_mesh::{BlockMesh, VertexKey};

/// One copy of a boundary vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeamRef {
    pub block: usize,
    pub lod: usize,
    pub vertex: u32,
}

#[derive(Debug, Default)]
pub struct SeamMap {
    refs: HashMap<VertexKey, Vec<SeamRef>>,
    keys_by_block: HashMap<usize, Vec<VertexKey>>,
    touched: HashSet<VertexKey>,
}

impl SeamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all copies owned by `block`, at every LOD.
    pub fn remove_block(&mut self, block: usize) {
        let Some(keys) = self.keys_by_block.remove(&block) else { return };
        for key in keys {
            if let Some(list) = self.refs.get_mut(&key) {
                list.retain(|r| r.block != block);
                if list.is_empty() {
                    self.refs.remove(&key);
                }
            }
            self.touched.insert(key);
        }
    }

    /// Register the boundary vertices of a freshly meshed block LOD.
    pub fn insert(&mut self, block: usize, lod: usize, mesh: &BlockMesh) {
        let keys = self.keys_by_block.entry(block).or_default();
        for &(key, vertex) in &mesh.seam_vertices {
            self.refs.entry(key).or_default().push(SeamRef { block, lod, vertex });
            keys.push(key);
            self.touched.insert(key);
        }
    }

    /// Number of distinct boundary positions tracked.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn copies(&self, key: &VertexKey) -> &[SeamRef] {
        self.refs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Give every copy of each boundary vertex touched since the last call
    /// one shared normal. `meshes[block][lod]` must hold the meshes the
    /// registered references point into. Returns the number of positions
    /// updated.
    pub fn finalize_boundary_vmap(&mut self, meshes: &mut [Vec<BlockMesh>]) -> usize {
        let mut updated = 0;
        for key in self.touched.drain() {
            let Some(list) = self.refs.get(&key) else { continue };
            let sum = list
                .iter()
                .map(|r| meshes[r.block][r.lod].accumulated[r.vertex as usize])
                .fold(Vec3::ZERO, |a, b| a + b);
            let normal = sum.normalize_or_zero();
            for r in list {
                meshes[r.block][r.lod].normals[r.vertex as usize] = normal;
            }
            updated += 1;
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_vertex_mesh(key: VertexKey, acc: Vec3) -> BlockMesh {
        let mut mesh = BlockMesh::new();
        let v = mesh.push_vertex(Vec3::ZERO);
        mesh.accumulated[v as usize] = acc;
        mesh.seam_vertices.push((key, v));
        mesh.finalize();
        mesh
    }

    #[test]
    fn test_shared_vertex_gets_common_normal() {
        let key = [4096, 0, 8192];
        let mut meshes = vec![
            vec![single_vertex_mesh(key, Vec3::new(1.0, 0.0, 1.0))],
            vec![single_vertex_mesh(key, Vec3::new(-1.0, 0.0, 1.0))],
        ];
        let mut seams = SeamMap::new();
        seams.insert(0, 0, &meshes[0][0]);
        seams.insert(1, 0, &meshes[1][0]);
        assert_eq!(seams.finalize_boundary_vmap(&mut meshes), 1);
        assert_eq!(meshes[0][0].normals[0], Vec3::Z);
        assert_eq!(meshes[0][0].normals[0], meshes[1][0].normals[0]);
    }

    #[test]
    fn test_remove_block_restores_own_normal() {
        let key = [0, 0, 0];
        let mut meshes = vec![
            vec![single_vertex_mesh(key, Vec3::new(1.0, 0.0, 1.0))],
            vec![single_vertex_mesh(key, Vec3::new(-1.0, 0.0, 1.0))],
        ];
        let mut seams = SeamMap::new();
        seams.insert(0, 0, &meshes[0][0]);
        seams.insert(1, 0, &meshes[1][0]);
        seams.finalize_boundary_vmap(&mut meshes);

        seams.remove_block(1);
        meshes[1][0] = BlockMesh::new();
        seams.finalize_boundary_vmap(&mut meshes);
        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!((meshes[0][0].normals[0] - expected).length() < 1e-6);
        assert_eq!(seams.copies(&key).len(), 1);
    }

    #[test]
    fn test_untouched_keys_skipped() {
        let mut meshes = vec![vec![single_vertex_mesh([1, 2, 3], Vec3::X)]];
        let mut seams = SeamMap::new();
        seams.insert(0, 0, &meshes[0][0]);
        assert_eq!(seams.finalize_boundary_vmap(&mut meshes), 1);
        assert_eq!(seams.finalize_boundary_vmap(&mut meshes), 0);
    }
}
