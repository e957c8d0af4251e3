//! Voxel grid storage, classification and connectivity

pub mod grid;
pub mod flags;
pub mod field;
pub mod surface;
pub mod classifier;
pub mod connectivity;

pub use grid::Grid3D;
pub use flags::VoxelFlags;
pub use field::ScalarField;
pub use surface::{SurfaceHeight, FlatSurface, HeightGrid};
pub use classifier::Classifier;
pub use connectivity::{ConnectivityPruner, PruneConfig, PruneMode, AnchorMode, HoleSeed};
