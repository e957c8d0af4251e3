//! Voxterra - volumetric voxel terrain
//!
//! A scalar density field on a dense 3D grid, sculpted procedurally or with
//! brushes, pruned of disconnected material, meshed block by block with
//! marching cubes and lit with baked ambient occlusion.

pub mod core;
pub mod math;
pub mod voxel;
pub mod generation;
pub mod mesh;
pub mod lighting;
pub mod terrain;
pub mod edit;

pub use terrain::{TerrainConfig, VoxelTerrain};
