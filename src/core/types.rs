//! Core type aliases and re-exports

pub use glam::{Vec2, Vec3, IVec3, UVec3};

/// Standard Result type for the engine
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Integer voxel coordinate `[x, y, z]`.
pub type VoxelCoord = [usize; 3];
