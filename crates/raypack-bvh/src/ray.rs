//! Mutable ray state for nearest-hit queries.

use std::sync::Arc;

use raypack_math::{Point3, Vec3};

use crate::material::{Material, Rgba};

/// A ray carrying its own nearest-hit state.
///
/// `t` is the current best hit distance; intersection routines only
/// commit hits strictly closer than it, so a single ray value can be
/// threaded through many primitive tests and ends up describing the
/// closest opaque hit. Callers may lower `t` before querying to bound
/// the search distance.
#[derive(Debug, Clone)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Vec3,
    /// Precomputed reciprocal of the direction components, for slab tests.
    pub(crate) inv_direction: Vec3,
    /// Current best hit distance; `f64::INFINITY` when nothing was hit yet.
    pub t: f64,
    /// Interpolated texture u coordinate of the committed hit.
    pub u: f64,
    /// Interpolated texture v coordinate of the committed hit.
    pub v: f64,
    /// Sampled material color of the committed hit.
    pub color: Rgba,
    /// Material of the committed hit.
    pub material: Option<Arc<dyn Material>>,
    /// Normalized surface normal of the committed hit.
    pub normal: Vec3,
}

impl Ray {
    /// Create a ray from origin and direction.
    ///
    /// The direction is normalized; the search window starts unbounded.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let direction = direction.normalize();
        let inv_direction = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        Self {
            origin,
            direction,
            inv_direction,
            t: f64::INFINITY,
            u: 0.0,
            v: 0.0,
            color: [0.0; 4],
            material: None,
            normal: Vec3::zeros(),
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// The committed hit point, meaningful only after a successful query.
    pub fn hit_point(&self) -> Point3 {
        self.at(self.t)
    }
}
