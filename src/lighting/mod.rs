//! Baked lighting terms for the terrain mesh

pub mod occlusion;

pub use occlusion::{apply_writes, AoConfig, OcclusionBaker, AO_LIT};
