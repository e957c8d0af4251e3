//! Ray and line segment operations

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for fast AABB intersection
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray. The direction is not required to be normalized;
    /// `t` is then measured in multiples of it.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(
                1.0 / direction.x,
                1.0 / direction.y,
                1.0 / direction.z,
            ),
        }
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray-AABB intersection using slab method
    /// Returns Some((t_near, t_far)) if intersection, None otherwise
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_near = t_min.x.max(t_min.y).max(t_min.z);
        let t_far = t_max.x.min(t_max.y).min(t_max.z);

        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }
}

/// Finite line segment between two points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
}

impl Segment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// Portion of the segment inside `aabb`, or None if it misses.
    pub fn clip(&self, aabb: &Aabb) -> Option<Segment> {
        let delta = self.end - self.start;
        if delta.length_squared() == 0.0 {
            return aabb.contains_point(self.start).then_some(*self);
        }

        // Axis-parallel segments produce 0 * inf in the slab test, so fall back
        // to a containment check on the flat axes.
        for axis in 0..3 {
            if delta[axis] == 0.0
                && (self.start[axis] < aabb.min[axis] || self.start[axis] > aabb.max[axis])
            {
                return None;
            }
        }
        let flat = Aabb::new(
            Vec3::select(delta.cmpeq(Vec3::ZERO), Vec3::splat(f32::MIN), aabb.min),
            Vec3::select(delta.cmpeq(Vec3::ZERO), Vec3::splat(f32::MAX), aabb.max),
        );

        let ray = Ray::new(self.start, delta);
        let (t_near, t_far) = ray.intersects_aabb(&flat)?;
        if t_near > 1.0 {
            return None;
        }
        Some(Segment::new(ray.at(t_near), ray.at(t_far.min(1.0))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(5.0), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_intersects_aabb_hit() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 2.0).abs() < 0.001);
        assert!((t_far - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_intersects_aabb_miss() {
        let ray = Ray::new(Vec3::new(-2.0, 5.0, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(ray.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn test_segment_clip_through_box() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        let seg = Segment::new(Vec3::new(-5.0, 5.0, 5.0), Vec3::new(15.0, 5.0, 5.0));
        let clipped = seg.clip(&aabb).unwrap();
        assert!((clipped.start.x - 0.0).abs() < 1e-5);
        assert!((clipped.end.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_segment_clip_short_of_box() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        let seg = Segment::new(Vec3::new(-5.0, 5.0, 5.0), Vec3::new(-1.0, 5.0, 5.0));
        assert!(seg.clip(&aabb).is_none());
    }

    #[test]
    fn test_segment_clip_inside_unchanged() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        let seg = Segment::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));
        let clipped = seg.clip(&aabb).unwrap();
        assert!((clipped.start - seg.start).length() < 1e-5);
        assert!((clipped.end - seg.end).length() < 1e-5);
    }

    #[test]
    fn test_segment_clip_parallel_outside() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        let seg = Segment::new(Vec3::new(-5.0, 12.0, 5.0), Vec3::new(15.0, 12.0, 5.0));
        assert!(seg.clip(&aabb).is_none());
    }
}
