//! Host integration: entity scanning, builder strategies, and progress
//! reporting.
//!
//! A host hands a collection of opaque entities to a registered builder
//! strategy and gets back a queryable [`SpatialIndex`]. The packed SAH
//! strategy only understands textured triangles; scenes containing
//! anything else are delegated wholesale to a configured fallback
//! strategy, discarding the partial scan.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use raypack_math::Vec3;

use crate::bvh::Bvh;
use crate::error::{BvhError, Result};
use crate::ray::Ray;
use crate::settings::BvhSettings;
use crate::triangles::{PackedTrianglesBuilder, TexturedTriangle};

/// Receives coarse progress updates during construction.
///
/// Builders treat construction as a 1000-step task: scanning entities
/// advances through 0..500 and node construction through 500..1000, the
/// latter at leaf-creation granularity.
pub trait ProgressSink {
    /// Restart the task at `done` out of `total` steps.
    fn update(&mut self, total: u32, done: u32);

    /// Advance to `done` steps, where the sink may skip updates closer
    /// than `step` to the previously reported value.
    fn update_interval(&mut self, done: u32, step: u32);
}

/// A sink that discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&mut self, _total: u32, _done: u32) {}

    fn update_interval(&mut self, _done: u32, _step: u32) {}
}

/// A renderable primitive produced by entity decomposition.
///
/// Concrete types are recovered by downcasting; the packed SAH builder
/// accepts exactly [`TexturedTriangle`].
pub trait Primitive: Any {
    /// The primitive as `Any`, for downcasting to a concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl Primitive for TexturedTriangle {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A scene object that decomposes into primitives.
pub trait Entity {
    /// The entity's primitives, positioned relative to `origin`.
    fn primitives(&self, origin: &Vec3) -> Vec<Box<dyn Primitive>>;
}

/// A built acceleration structure answering nearest-hit queries.
pub trait SpatialIndex {
    /// Find the closest non-transparent hit along `ray`; see
    /// [`Bvh::closest_intersection`].
    fn closest_intersection(&self, ray: &mut Ray) -> bool;
}

impl SpatialIndex for Bvh {
    fn closest_intersection(&self, ray: &mut Ray) -> bool {
        Bvh::closest_intersection(self, ray)
    }
}

/// Builds a [`SpatialIndex`] from a collection of entities.
pub trait BvhBuilder {
    /// Identifier used for registry lookup.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Build an index over all primitives of `entities`.
    fn build(
        &self,
        entities: &[Arc<dyn Entity>],
        origin: &Vec3,
        progress: &mut dyn ProgressSink,
    ) -> Result<Box<dyn SpatialIndex>>;
}

/// The packed SAH strategy.
///
/// Scans entities into a [`PackedTrianglesBuilder`] and constructs a
/// [`Bvh`]. The first non-triangle primitive aborts the scan and hands
/// the entire build to the fallback builder; nothing from the aborted
/// attempt is reused.
#[derive(Default)]
pub struct PackedSahBuilder {
    settings: BvhSettings,
    fallback: Option<Box<dyn BvhBuilder>>,
}

impl PackedSahBuilder {
    /// Create the strategy with default settings and no fallback.
    pub fn new() -> Self {
        Self {
            settings: BvhSettings::default(),
            fallback: None,
        }
    }

    /// Replace the construction settings.
    pub fn with_settings(mut self, settings: BvhSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Configure the builder that takes over when a scene contains
    /// non-triangle primitives.
    pub fn with_fallback(mut self, fallback: Box<dyn BvhBuilder>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl BvhBuilder for PackedSahBuilder {
    fn name(&self) -> &'static str {
        "packed-sah"
    }

    fn description(&self) -> &'static str {
        "Memory efficient, fast and nearly optimal BVH building method"
    }

    fn build(
        &self,
        entities: &[Arc<dyn Entity>],
        origin: &Vec3,
        progress: &mut dyn ProgressSink,
    ) -> Result<Box<dyn SpatialIndex>> {
        progress.update(1000, 0);

        let mut builder = PackedTrianglesBuilder::new();
        let scale = if entities.is_empty() {
            0.0
        } else {
            500.0 / entities.len() as f64
        };

        for (done, entity) in entities.iter().enumerate() {
            for primitive in entity.primitives(origin) {
                match primitive.as_any().downcast_ref::<TexturedTriangle>() {
                    Some(triangle) => builder.add_triangle(triangle),
                    None => {
                        let fallback = self
                            .fallback
                            .as_ref()
                            .ok_or(BvhError::UnsupportedPrimitive)?;
                        log::warn!(
                            "scene contains a non-triangle primitive, delegating to {}",
                            fallback.name()
                        );
                        return fallback.build(entities, origin, progress);
                    }
                }
            }
            progress.update_interval(((done + 1) as f64 * scale) as u32, 1);
        }

        let bvh = Bvh::build_with_settings(builder.build(), &self.settings, progress)?;
        Ok(Box::new(bvh))
    }
}

/// Registry of builder strategies, keyed by name.
#[derive(Default)]
pub struct BuilderRegistry {
    builders: HashMap<&'static str, Box<dyn BvhBuilder>>,
}

impl BuilderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder under its own name, replacing any previous
    /// entry with that name.
    pub fn register(&mut self, builder: Box<dyn BvhBuilder>) {
        self.builders.insert(builder.name(), builder);
    }

    /// Look up a builder by name.
    pub fn get(&self, name: &str) -> Option<&dyn BvhBuilder> {
        self.builders.get(name).map(|builder| builder.as_ref())
    }

    /// Build an index with the named strategy.
    pub fn create(
        &self,
        name: &str,
        entities: &[Arc<dyn Entity>],
        origin: &Vec3,
        progress: &mut dyn ProgressSink,
    ) -> Result<Box<dyn SpatialIndex>> {
        let builder = self
            .get(name)
            .ok_or_else(|| BvhError::UnknownBuilder(name.to_string()))?;
        builder.build(entities, origin, progress)
    }
}
