#![warn(missing_docs)]

//! Math types for the raypack ray tracing kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for
//! ray tracing: points, vectors, axis-aligned bounding boxes, and the
//! tolerance constants shared by intersection tests.

use nalgebra::{Unit, Vector2, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D texture space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Self-intersection threshold for ray-primitive tests.
///
/// Hit distances below this are rejected so a ray spawned on a surface
/// does not immediately re-hit it; the same threshold guards against
/// near-zero determinants in the triangle test.
pub const EPSILON: f64 = 5e-6;

/// Slack added to the slab-test exit distance.
///
/// Lets rays graze box faces and degenerate (flat) boxes without
/// dropping out of traversal.
pub const OFFSET: f64 = 1e-4;

/// Axis-aligned bounding box in 3D.
///
/// Stored as per-axis intervals rather than corner points, matching the
/// packed `[xmin, xmax, ymin, ymax, zmin, zmax]` layout used by the BVH
/// node table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum x.
    pub xmin: f64,
    /// Maximum x.
    pub xmax: f64,
    /// Minimum y.
    pub ymin: f64,
    /// Maximum y.
    pub ymax: f64,
    /// Minimum z.
    pub zmin: f64,
    /// Maximum z.
    pub zmax: f64,
}

impl Aabb {
    /// Create an AABB from its six interval bounds.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64, zmin: f64, zmax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
            zmin,
            zmax,
        }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
            zmin: f64::INFINITY,
            zmax: f64::NEG_INFINITY,
        }
    }

    /// Whether this box contains no points (still in the inverted state).
    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.xmin = self.xmin.min(p.x);
        self.xmax = self.xmax.max(p.x);
        self.ymin = self.ymin.min(p.y);
        self.ymax = self.ymax.max(p.y);
        self.zmin = self.zmin.min(p.z);
        self.zmax = self.zmax.max(p.z);
    }

    /// The smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            xmin: self.xmin.min(other.xmin),
            xmax: self.xmax.max(other.xmax),
            ymin: self.ymin.min(other.ymin),
            ymax: self.ymax.max(other.ymax),
            zmin: self.zmin.min(other.zmin),
            zmax: self.zmax.max(other.zmax),
        }
    }

    /// Whether `p` lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.xmin
            && p.x <= self.xmax
            && p.y >= self.ymin
            && p.y <= self.ymax
            && p.z >= self.zmin
            && p.z <= self.zmax
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
