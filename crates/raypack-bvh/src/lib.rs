#![warn(missing_docs)]

//! Packed SAH bounding volume hierarchy for triangle ray tracing.
//!
//! This crate provides a memory-efficient spatial index over triangle
//! scenes: triangles live in packed structure-of-arrays storage with a
//! deduplicated material palette, construction partitions them with a
//! surface-area-heuristic sweep driven by an explicit work stack, and
//! queries walk a flat 32-byte-per-node table with a branchless slab
//! test. Everything is single-threaded and static once built; the
//! finished index is safe to query concurrently with per-query [`Ray`]
//! state.
//!
//! # Architecture
//!
//! - [`PackedTriangles`] / [`PackedTrianglesBuilder`] - packed triangle
//!   storage and the append-only builder that produces it
//! - sorting entry points on [`PackedTriangles`] - five interchangeable
//!   strategies ordering a range by a projected center key
//! - [`Bvh`] - iterative SAH construction and nearest-hit traversal
//! - [`strategy`] - host integration: entity scanning, fallback
//!   delegation, and progress reporting
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use raypack_bvh::{Bvh, FlatMaterial, Material, PackedTrianglesBuilder, Ray, TexturedTriangle};
//! use raypack_math::{Point2, Point3, Vec3};
//!
//! let material: Arc<dyn Material> = Arc::new(FlatMaterial::new([1.0, 1.0, 1.0, 1.0]));
//!
//! let mut builder = PackedTrianglesBuilder::new();
//! builder.add_triangle(&TexturedTriangle {
//!     origin: Point3::origin(),
//!     e1: Vec3::new(1.0, 0.0, 0.0),
//!     e2: Vec3::new(0.0, 1.0, 0.0),
//!     uv1: Point2::new(0.0, 0.0),
//!     uv2: Point2::new(1.0, 0.0),
//!     uv3: Point2::new(0.0, 1.0),
//!     material,
//!     double_sided: false,
//! });
//!
//! let bvh = Bvh::build(builder.build());
//!
//! let mut ray = Ray::new(Point3::new(0.25, 0.25, -1.0), Vec3::new(0.0, 0.0, 1.0));
//! if bvh.closest_intersection(&mut ray) {
//!     println!("hit at distance {} with color {:?}", ray.t, ray.color);
//! }
//! ```

mod bvh;
mod error;
mod material;
mod ray;
mod settings;
mod sort;
pub mod strategy;
mod triangles;

pub use bvh::{Bvh, BvhNode, SPLIT_LIMIT};
pub use error::{BvhError, Result};
pub use material::{FlatMaterial, Material, Rgba};
pub use ray::Ray;
pub use settings::BvhSettings;
pub use sort::SORT_CROSSOVER;
pub use strategy::{NullProgress, ProgressSink};
pub use triangles::{PackedTriangles, PackedTrianglesBuilder, TexturedTriangle};
