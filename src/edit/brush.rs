//! Sculpting brushes

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;
use crate::math::Aabb;

/// Footprint of a brush.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BrushShape {
    /// Axis-aligned cube with half extent `radius`, full weight everywhere.
    Cube,
    /// Ball whose weight fades as `(1 - d / r)^falloff`.
    Sphere { falloff: f32 },
}

/// One recorded sculpting stroke. Positive weight adds material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    pub position: Vec3,
    pub shape: BrushShape,
    pub radius: f32,
    pub weight: f32,
}

impl Brush {
    pub fn sphere(position: Vec3, radius: f32, weight: f32, falloff: f32) -> Self {
        Self {
            position,
            shape: BrushShape::Sphere { falloff },
            radius,
            weight,
        }
    }

    pub fn cube(position: Vec3, half_extent: f32, weight: f32) -> Self {
        Self {
            position,
            shape: BrushShape::Cube,
            radius: half_extent,
            weight,
        }
    }

    /// The same stroke with opposite weight.
    pub fn negated(&self) -> Self {
        Self { weight: -self.weight, ..*self }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.position, Vec3::splat(self.radius))
    }

    /// Solidity change at a world position.
    pub fn delta_at(&self, p: Vec3) -> f32 {
        match self.shape {
            BrushShape::Cube => {
                let d = (p - self.position).abs();
                if d.max_element() <= self.radius { self.weight } else { 0.0 }
            }
            BrushShape::Sphere { falloff } => {
                let d = p.distance(self.position);
                if d < self.radius {
                    self.weight * (1.0 - d / self.radius).powf(falloff)
                } else {
                    0.0
                }
            }
        }
    }
}
