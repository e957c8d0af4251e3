//! Triangle mesh for one block at one LOD

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;

/// Quantised grid-space vertex position. Grid coordinates scaled by
/// [`KEY_SCALE`] and rounded.
pub type VertexKey = [i64; 3];

/// Sub-voxel resolution of [`VertexKey`].
pub const KEY_SCALE: f32 = 1024.0;

/// Interleaved vertex for GPU upload
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Indexed triangle list with per-vertex normals.
///
/// `accumulated` holds the raw sum of face normals for each vertex; `normals`
/// is only valid after [`BlockMesh::finalize`] (or seam reconciliation).
#[derive(Clone, Debug, Default)]
pub struct BlockMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub accumulated: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Vertices lying on the block's x/y boundary planes.
    pub seam_vertices: Vec<(VertexKey, u32)>,
}

impl BlockMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.accumulated.clear();
        self.indices.clear();
        self.seam_vertices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append a vertex with no normal contribution yet.
    pub fn push_vertex(&mut self, position: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.accumulated.push(Vec3::ZERO);
        index
    }

    /// Append a triangle and add its face normal to each corner.
    pub fn push_triangle(&mut self, tri: [u32; 3], face_normal: Vec3) {
        for &i in &tri {
            self.accumulated[i as usize] += face_normal;
        }
        self.indices.extend_from_slice(&tri);
    }

    /// Normalise accumulated normals.
    pub fn finalize(&mut self) {
        self.normals = self
            .accumulated
            .iter()
            .map(|n| n.normalize_or_zero())
            .collect();
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn interleaved(&self) -> Vec<MeshVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .map(|(p, n)| MeshVertex {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
