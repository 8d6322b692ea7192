//! Material abstraction for triangle shading.

use std::sync::Arc;

/// An RGBA color sample, alpha in the last component.
pub type Rgba = [f32; 4];

/// An opaque shading function from texture coordinates to color.
///
/// The kernel never inspects materials structurally. Palette
/// deduplication compares allocation identity: two `Arc<dyn Material>`
/// handles are the same palette entry iff they point at the same
/// allocation.
pub trait Material: Send + Sync + std::fmt::Debug {
    /// Sample the material color at texture coordinates `(u, v)`.
    ///
    /// An alpha of zero (or below) marks a fully transparent texel;
    /// rays pass through such samples without registering a hit.
    fn color_at(&self, u: f64, v: f64) -> Rgba;
}

/// A material with a single color everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FlatMaterial {
    /// The color returned for every texel.
    pub color: Rgba,
}

impl FlatMaterial {
    /// Create a flat material from an RGBA color.
    pub fn new(color: Rgba) -> Self {
        Self { color }
    }
}

impl Material for FlatMaterial {
    fn color_at(&self, _u: f64, _v: f64) -> Rgba {
        self.color
    }
}

/// Identity key of a material handle: its allocation address.
pub(crate) fn material_key(material: &Arc<dyn Material>) -> usize {
    Arc::as_ptr(material) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_material_samples_constant_color() {
        let material = FlatMaterial::new([0.25, 0.5, 0.75, 1.0]);
        assert_eq!(material.color_at(0.0, 0.0), [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(material.color_at(0.9, 0.1), [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_material_key_is_allocation_identity() {
        let a: Arc<dyn Material> = Arc::new(FlatMaterial::new([1.0; 4]));
        let b = Arc::clone(&a);
        // Same allocation, same key.
        assert_eq!(material_key(&a), material_key(&b));

        // Equal contents but a distinct allocation gets a distinct key.
        let c: Arc<dyn Material> = Arc::new(FlatMaterial::new([1.0; 4]));
        assert_ne!(material_key(&a), material_key(&c));
    }
}
