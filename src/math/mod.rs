//! Mathematical utilities and data structures

pub mod aabb;
pub mod ray;

pub use aabb::{Aabb, VoxelBox};
pub use ray::{Ray, Segment};
