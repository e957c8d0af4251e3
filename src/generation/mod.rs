//! Field generation: procedural noise, attenuation, shape rasterisation and
//! heightmap import.
//!
//! Everything here writes raw values into a [`ScalarField`](crate::voxel::ScalarField);
//! classification and meshing happen afterwards.

pub mod config;
pub mod sampler;
pub mod attenuation;
pub mod field_gen;
pub mod shapes;
pub mod heightmap;

pub use config::FieldParams;
pub use sampler::{NoiseSampler, FbmSampler};
pub use attenuation::{Attenuation, TopHeight, SphereMode};
pub use field_gen::generate_field;
pub use shapes::{SolidShape, PlacedShape, create_from_bounding_shapes};
pub use heightmap::{import_heights, load_height_image};
