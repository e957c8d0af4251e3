//! Terrain assembly: configuration, block management and the public facade

pub mod config;
pub mod blocks;
pub mod volume;

pub use config::TerrainConfig;
pub use blocks::{BlockIndex, BlockManager, ColliderSink, NullColliders};
pub use volume::{TerrainStats, VoxelTerrain};
