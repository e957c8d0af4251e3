//! Terrain construction settings

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{Result, Vec3};
use crate::core::Error;
use crate::lighting::AoConfig;
use crate::voxel::PruneConfig;

/// Everything needed to build a [`super::VoxelTerrain`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Voxel counts along x, y, z
    pub dims: [usize; 3],
    pub cell_size: Vec3,
    /// World centre of the grid; None puts voxel (0, 0, 0) at the world origin
    pub center: Option<Vec3>,
    pub isolevel: f32,
    /// Solid below the isolevel instead of above
    pub invert: bool,
    /// Force the grid shell empty so the mesh is closed
    pub closed_surface: bool,
    /// Cubes per block along x and y
    pub block_size: usize,
    pub lod_count: usize,
    /// Clamp edited values to [-1, 1]
    pub normalize: bool,
    /// Skip cubes hidden under the external surface
    pub remove_under_mesh: bool,
    pub prune: PruneConfig,
    pub ao: AoConfig,
    /// Layers falling material drops per second
    pub fall_layers_per_second: f32,
    /// Batch mode: no debris or impact events
    pub offline: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            dims: [64, 64, 32],
            cell_size: Vec3::ONE,
            center: None,
            isolevel: 0.0,
            invert: false,
            closed_surface: false,
            block_size: 16,
            lod_count: 3,
            normalize: true,
            remove_under_mesh: false,
            prune: PruneConfig::default(),
            ao: AoConfig::default(),
            fall_layers_per_second: 10.0,
            offline: false,
        }
    }
}

impl TerrainConfig {
    /// Reject settings the block and LOD layout cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.dims.iter().any(|&n| n < 2) {
            return Err(Error::Config(format!(
                "grid needs at least 2 voxels per axis, got {:?}",
                self.dims
            )));
        }
        if !(self.cell_size.cmpgt(Vec3::ZERO).all() && self.cell_size.is_finite()) {
            return Err(Error::Config(format!("invalid cell size {}", self.cell_size)));
        }
        if self.block_size == 0 {
            return Err(Error::Config("block size must be positive".into()));
        }
        if self.lod_count == 0 || self.lod_count > 8 {
            return Err(Error::Config(format!("lod count {} out of range 1..=8", self.lod_count)));
        }
        let stride = self.max_lod_stride();
        if self.block_size % stride != 0 {
            return Err(Error::Config(format!(
                "block size {} not divisible by coarsest LOD stride {}",
                self.block_size, stride
            )));
        }
        self.fall_interval()?;
        if self.ao.stride == 0 || !(self.ao.radius > 0.0) {
            return Err(Error::Config("AO radius and stride must be positive".into()));
        }
        Ok(())
    }

    /// Time between two falling steps.
    pub fn fall_interval(&self) -> Result<Duration> {
        let rate = self.fall_layers_per_second;
        if !(rate > 0.0) {
            return Err(Error::Config(format!("fall rate {} must be positive", rate)));
        }
        Duration::try_from_secs_f32(1.0 / rate)
            .map_err(|e| Error::Config(format!("fall rate {}: {}", rate, e)))
    }

    /// Voxel step of the coarsest LOD.
    pub fn max_lod_stride(&self) -> usize {
        1 << self.lod_count.saturating_sub(1)
    }

    /// World position of voxel (0, 0, 0).
    pub fn origin(&self) -> Vec3 {
        match self.center {
            Some(center) => {
                let span = Vec3::new(
                    (self.dims[0] - 1) as f32,
                    (self.dims[1] - 1) as f32,
                    (self.dims[2] - 1) as f32,
                );
                center - self.cell_size * span * 0.5
            }
            None => Vec3::ZERO,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
