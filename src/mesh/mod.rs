//! Isosurface extraction: marching cubes per block and LOD, plus seam
//! normal reconciliation between blocks.

pub mod tables;
pub mod block_mesh;
pub mod marching;
pub mod seams;

pub use block_mesh::{BlockMesh, MeshVertex, VertexKey, KEY_SCALE};
pub use marching::{CubeRange, IsosurfaceMesher};
pub use seams::{SeamMap, SeamRef};
