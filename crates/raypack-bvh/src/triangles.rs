//! Packed structure-of-arrays triangle storage.
//!
//! Triangles are stored field-by-field in parallel flat arrays rather
//! than as an array of records: 9 geometry floats (origin + two edge
//! vectors), 6 texture floats (three u,v pairs), one material palette
//! index, and one double-sided flag per triangle. The layout is built
//! once through [`PackedTrianglesBuilder`] and afterwards only ever
//! reordered in whole-record units; the triangle multiset never changes.

use std::collections::HashMap;
use std::sync::Arc;

use raypack_math::{Aabb, Point2, Point3, Vec3, EPSILON};

use crate::material::{material_key, Material};
use crate::ray::Ray;

/// Geometry floats per triangle: origin.xyz, edge1.xyz, edge2.xyz.
pub(crate) const GEOM_STRIDE: usize = 9;

/// Texture floats per triangle: three (u, v) pairs.
pub(crate) const UV_STRIDE: usize = 6;

/// A textured triangle in origin + edge-vector form.
///
/// This is the input record for [`PackedTrianglesBuilder`]: vertices are
/// `origin`, `origin + e1`, and `origin + e2`, with one texture
/// coordinate pair per vertex. Materials are compared by allocation
/// identity when building the palette.
#[derive(Debug, Clone)]
pub struct TexturedTriangle {
    /// First vertex.
    pub origin: Point3,
    /// Edge from the first to the second vertex.
    pub e1: Vec3,
    /// Edge from the first to the third vertex.
    pub e2: Vec3,
    /// Texture coordinates of the first vertex.
    pub uv1: Point2,
    /// Texture coordinates of the second vertex.
    pub uv2: Point2,
    /// Texture coordinates of the third vertex.
    pub uv3: Point2,
    /// Shading material.
    pub material: Arc<dyn Material>,
    /// Whether the triangle is intersectable from both faces.
    pub double_sided: bool,
}

/// Append-only builder producing a [`PackedTriangles`] store.
///
/// Accepts any geometry and material values; there are no error paths.
#[derive(Debug, Default)]
pub struct PackedTrianglesBuilder {
    points: Vec<f32>,
    uv: Vec<f32>,
    material_ids: Vec<u32>,
    double_sided: Vec<bool>,
    palette: Vec<Arc<dyn Material>>,
    palette_index: HashMap<usize, u32>,
    count: usize,
}

impl PackedTrianglesBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles appended so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Append one triangle to the packed arrays.
    ///
    /// The material is looked up by identity in the palette, inserting a
    /// new entry on first occurrence (amortized O(1)); palette indices
    /// are assigned in first-appearance order.
    pub fn add_triangle(&mut self, triangle: &TexturedTriangle) {
        self.points.extend_from_slice(&[
            triangle.origin.x as f32,
            triangle.origin.y as f32,
            triangle.origin.z as f32,
            triangle.e1.x as f32,
            triangle.e1.y as f32,
            triangle.e1.z as f32,
            triangle.e2.x as f32,
            triangle.e2.y as f32,
            triangle.e2.z as f32,
        ]);

        self.uv.extend_from_slice(&[
            triangle.uv1.x as f32,
            triangle.uv1.y as f32,
            triangle.uv2.x as f32,
            triangle.uv2.y as f32,
            triangle.uv3.x as f32,
            triangle.uv3.y as f32,
        ]);

        let key = material_key(&triangle.material);
        let material_id = match self.palette_index.get(&key) {
            Some(&id) => id,
            None => {
                let id = self.palette.len() as u32;
                self.palette.push(Arc::clone(&triangle.material));
                self.palette_index.insert(key, id);
                id
            }
        };
        self.material_ids.push(material_id);

        self.double_sided.push(triangle.double_sided);

        self.count += 1;
    }

    /// Trim backing storage to exact size and freeze the count.
    pub fn build(mut self) -> PackedTriangles {
        self.points.shrink_to_fit();
        self.uv.shrink_to_fit();
        self.material_ids.shrink_to_fit();
        self.double_sided.shrink_to_fit();
        self.palette.shrink_to_fit();
        PackedTriangles {
            points: self.points,
            uv: self.uv,
            material_ids: self.material_ids,
            double_sided: self.double_sided,
            palette: self.palette,
            count: self.count,
        }
    }
}

/// Packed triangle dataset with a deduplicated material palette.
///
/// The triangle count is fixed at build time. Sorting entry points (see
/// the crate-level sorting module) permute whole records in place; no
/// other mutation exists, so a store behind a shared reference is safe
/// to query from multiple threads.
#[derive(Debug, Clone)]
pub struct PackedTriangles {
    pub(crate) points: Vec<f32>,
    pub(crate) uv: Vec<f32>,
    pub(crate) material_ids: Vec<u32>,
    pub(crate) double_sided: Vec<bool>,
    palette: Vec<Arc<dyn Material>>,
    count: usize,
}

impl PackedTriangles {
    /// Number of triangles in the store.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the store holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The material palette, in first-appearance order.
    pub fn palette(&self) -> &[Arc<dyn Material>] {
        &self.palette
    }

    /// Palette index of one triangle's material.
    pub fn material_id(&self, index: usize) -> u32 {
        self.material_ids[index]
    }

    /// Whether one triangle is intersectable from both faces.
    pub fn is_double_sided(&self, index: usize) -> bool {
        self.double_sided[index]
    }

    /// Projected center keys for `[from, to)` along `axis`.
    ///
    /// The key is `min + max` of the three vertex coordinates along the
    /// axis. It is twice the interval midpoint, but only the relative
    /// order of keys matters to the callers.
    pub(crate) fn compute_centers(&self, from: usize, to: usize, axis: usize) -> Vec<f32> {
        let mut centers = Vec::with_capacity(to - from);
        for index in from..to {
            let base = GEOM_STRIDE * index;
            let origin = self.points[base + axis];
            let mut min = origin;
            let mut max = origin;
            for i in 1..3 {
                let coordinate = self.points[base + i * 3 + axis] + origin;
                min = min.min(coordinate);
                max = max.max(coordinate);
            }
            centers.push(min + max);
        }
        centers
    }

    /// Swap two whole records across all parallel arrays.
    pub(crate) fn swap_records(&mut self, a: usize, b: usize) {
        for i in 0..GEOM_STRIDE {
            self.points.swap(GEOM_STRIDE * a + i, GEOM_STRIDE * b + i);
        }
        for i in 0..UV_STRIDE {
            self.uv.swap(UV_STRIDE * a + i, UV_STRIDE * b + i);
        }
        self.material_ids.swap(a, b);
        self.double_sided.swap(a, b);
    }

    /// Copy the record at `from` over the record at `to`.
    pub(crate) fn move_record(&mut self, from: usize, to: usize) {
        self.points
            .copy_within(GEOM_STRIDE * from..GEOM_STRIDE * (from + 1), GEOM_STRIDE * to);
        self.uv
            .copy_within(UV_STRIDE * from..UV_STRIDE * (from + 1), UV_STRIDE * to);
        self.material_ids[to] = self.material_ids[from];
        self.double_sided[to] = self.double_sided[from];
    }

    /// Tight bounding box over the vertices of triangles in `[from, to)`.
    pub fn compute_aabb(&self, from: usize, to: usize) -> Aabb {
        let mut aabb = Aabb::empty();
        for index in from..to {
            self.expand_aabb(&mut aabb, index);
        }
        aabb
    }

    /// Grow `aabb` to include one triangle's three vertices.
    pub fn expand_aabb(&self, aabb: &mut Aabb, index: usize) {
        let base = GEOM_STRIDE * index;
        let ox = self.points[base];
        let oy = self.points[base + 1];
        let oz = self.points[base + 2];
        aabb.include_point(&Point3::new(ox as f64, oy as f64, oz as f64));
        for i in 1..3 {
            let point_base = base + 3 * i;
            let x = self.points[point_base] + ox;
            let y = self.points[point_base + 1] + oy;
            let z = self.points[point_base + 2] + oz;
            aabb.include_point(&Point3::new(x as f64, y as f64, z as f64));
        }
    }

    /// Möller-Trumbore ray-triangle intersection against one triangle.
    ///
    /// Commits to `ray` (distance, texture coordinates, color, material,
    /// normal) and returns `true` only when the hit is strictly inside
    /// the `(EPSILON, ray.t)` window and the material sample at the hit
    /// is not fully transparent. Single-sided triangles reject
    /// non-negative determinants (back faces); double-sided triangles
    /// reject only near-zero determinants (degenerate or parallel).
    pub fn intersect(&self, index: usize, ray: &mut Ray) -> bool {
        let base = GEOM_STRIDE * index;

        let e1 = Vec3::new(
            self.points[base + 3] as f64,
            self.points[base + 4] as f64,
            self.points[base + 5] as f64,
        );
        let e2 = Vec3::new(
            self.points[base + 6] as f64,
            self.points[base + 7] as f64,
            self.points[base + 8] as f64,
        );

        let pvec = ray.direction.cross(&e2);
        let det = pvec.dot(&e1);
        if self.double_sided[index] {
            if det > -EPSILON && det < EPSILON {
                return false;
            }
        } else if det > -EPSILON {
            return false;
        }
        let recip = 1.0 / det;

        let origin = Point3::new(
            self.points[base] as f64,
            self.points[base + 1] as f64,
            self.points[base + 2] as f64,
        );
        let tvec = ray.origin - origin;

        let u = tvec.dot(&pvec) * recip;
        if u < 0.0 || u > 1.0 {
            return false;
        }

        let qvec = tvec.cross(&e1);
        let v = ray.direction.dot(&qvec) * recip;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = e2.dot(&qvec) * recip;
        if t > EPSILON && t < ray.t {
            let w = 1.0 - u - v;

            let uv_base = UV_STRIDE * index;
            let hit_u = self.uv[uv_base] as f64 * u
                + self.uv[uv_base + 2] as f64 * v
                + self.uv[uv_base + 4] as f64 * w;
            let hit_v = self.uv[uv_base + 1] as f64 * u
                + self.uv[uv_base + 3] as f64 * v
                + self.uv[uv_base + 5] as f64 * w;

            let material = &self.palette[self.material_ids[index] as usize];
            let color = material.color_at(hit_u, hit_v);
            if color[3] > 0.0 {
                ray.u = hit_u;
                ray.v = hit_v;
                ray.color = color;
                ray.material = Some(Arc::clone(material));
                ray.t = t;
                ray.normal = e2.cross(&e1).normalize();
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::material::FlatMaterial;
    use approx::assert_relative_eq;

    pub(crate) fn flat_material(color: [f32; 4]) -> Arc<dyn Material> {
        Arc::new(FlatMaterial::new(color))
    }

    pub(crate) fn unit_triangle(material: &Arc<dyn Material>, double_sided: bool) -> TexturedTriangle {
        TexturedTriangle {
            origin: Point3::origin(),
            e1: Vec3::new(1.0, 0.0, 0.0),
            e2: Vec3::new(0.0, 1.0, 0.0),
            uv1: Point2::new(0.0, 0.0),
            uv2: Point2::new(1.0, 0.0),
            uv3: Point2::new(0.0, 1.0),
            material: Arc::clone(material),
            double_sided,
        }
    }

    #[test]
    fn test_builder_packs_parallel_arrays() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        for _ in 0..3 {
            builder.add_triangle(&unit_triangle(&material, false));
        }
        let triangles = builder.build();
        assert_eq!(triangles.count(), 3);
        assert_eq!(triangles.points.len(), 3 * GEOM_STRIDE);
        assert_eq!(triangles.uv.len(), 3 * UV_STRIDE);
        assert_eq!(triangles.material_ids.len(), 3);
        assert_eq!(triangles.double_sided.len(), 3);
    }

    #[test]
    fn test_builder_deduplicates_materials_by_identity() {
        let a = flat_material([1.0; 4]);
        let b = Arc::clone(&a);
        // Same contents, different allocation.
        let c = flat_material([1.0; 4]);

        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&a, false));
        builder.add_triangle(&unit_triangle(&b, false));
        builder.add_triangle(&unit_triangle(&c, false));
        builder.add_triangle(&unit_triangle(&a, false));
        let triangles = builder.build();

        assert_eq!(triangles.palette().len(), 2);
        assert_eq!(triangles.material_id(0), 0);
        assert_eq!(triangles.material_id(1), 0);
        assert_eq!(triangles.material_id(2), 1);
        assert_eq!(triangles.material_id(3), 0);
    }

    #[test]
    fn test_compute_aabb_covers_edge_vertices() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&TexturedTriangle {
            origin: Point3::new(1.0, 2.0, 3.0),
            e1: Vec3::new(-2.0, 0.0, 0.0),
            e2: Vec3::new(0.0, 4.0, -1.0),
            ..unit_triangle(&material, false)
        });
        let triangles = builder.build();

        let aabb = triangles.compute_aabb(0, 1);
        assert_eq!(aabb, Aabb::new(-1.0, 1.0, 2.0, 6.0, 2.0, 3.0));
    }

    #[test]
    fn test_compute_aabb_matches_per_triangle_union() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        for i in 0..7 {
            let f = i as f64;
            builder.add_triangle(&TexturedTriangle {
                origin: Point3::new(f, -f, f * 0.5),
                e1: Vec3::new(1.0 + f, 0.25, 0.0),
                e2: Vec3::new(-0.5, 1.0, f),
                ..unit_triangle(&material, false)
            });
        }
        let triangles = builder.build();

        let whole = triangles.compute_aabb(1, 6);
        let mut union = Aabb::empty();
        for i in 1..6 {
            union = union.union(&triangles.compute_aabb(i, i + 1));
        }
        assert_eq!(whole, union);
    }

    #[test]
    fn test_intersect_front_face_hit() {
        let material = flat_material([0.5, 0.25, 0.125, 1.0]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, false));
        let triangles = builder.build();

        let mut ray = Ray::new(Point3::new(0.2, 0.3, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(triangles.intersect(0, &mut ray));
        assert_relative_eq!(ray.t, 1.0, epsilon = 1e-9);
        // Hit point (0.2, 0.3) has barycentric (u, v, w) = (0.2, 0.3, 0.5);
        // texture coordinates interpolate uv1*u + uv2*v + uv3*w.
        assert_relative_eq!(ray.u, 0.3, epsilon = 1e-6);
        assert_relative_eq!(ray.v, 0.5, epsilon = 1e-6);
        assert_eq!(ray.color, [0.5, 0.25, 0.125, 1.0]);
        assert!(ray.material.is_some());
        // Face normal is e2 x e1, normalized.
        assert!((ray.normal - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_intersect_culls_back_face_unless_double_sided() {
        let material = flat_material([1.0; 4]);

        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, false));
        let single = builder.build();

        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, true));
        let double = builder.build();

        // Approach from behind the face (normal points towards -z).
        let mut ray = Ray::new(Point3::new(0.2, 0.3, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!single.intersect(0, &mut ray));
        assert_eq!(ray.t, f64::INFINITY);

        let mut ray = Ray::new(Point3::new(0.2, 0.3, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(double.intersect(0, &mut ray));
        assert!((ray.t - 1.0).abs() < 1e-9);

        // Front face hits either way.
        let mut ray = Ray::new(Point3::new(0.2, 0.3, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(single.intersect(0, &mut ray));
    }

    #[test]
    fn test_intersect_rejects_outside_barycentric_range() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, false));
        let triangles = builder.build();

        // Past the diagonal edge: u + v > 1.
        let mut ray = Ray::new(Point3::new(0.8, 0.8, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!triangles.intersect(0, &mut ray));

        // Outside the e1 edge: v < 0.
        let mut ray = Ray::new(Point3::new(0.5, -0.1, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!triangles.intersect(0, &mut ray));
    }

    #[test]
    fn test_intersect_transparent_texel_passes_through() {
        let material = flat_material([1.0, 1.0, 1.0, 0.0]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, false));
        let triangles = builder.build();

        let mut ray = Ray::new(Point3::new(0.2, 0.3, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!triangles.intersect(0, &mut ray));
        assert_eq!(ray.t, f64::INFINITY);
        assert!(ray.material.is_none());
        assert_eq!(ray.u, 0.0);
        assert_eq!(ray.v, 0.0);
    }

    #[test]
    fn test_intersect_respects_current_best_distance() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&unit_triangle(&material, false));
        let triangles = builder.build();

        let mut ray = Ray::new(Point3::new(0.2, 0.3, -1.0), Vec3::new(0.0, 0.0, 1.0));
        ray.t = 0.5;
        assert!(!triangles.intersect(0, &mut ray));
        assert_eq!(ray.t, 0.5);
    }

    #[test]
    fn test_intersect_degenerate_triangle_is_a_miss() {
        let material = flat_material([1.0; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&TexturedTriangle {
            e1: Vec3::zeros(),
            e2: Vec3::zeros(),
            ..unit_triangle(&material, false)
        });
        builder.add_triangle(&TexturedTriangle {
            e1: Vec3::zeros(),
            e2: Vec3::zeros(),
            ..unit_triangle(&material, true)
        });
        let triangles = builder.build();

        let mut ray = Ray::new(Point3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!triangles.intersect(0, &mut ray));
        assert!(!triangles.intersect(1, &mut ray));
    }

    #[test]
    fn test_swap_and_move_keep_arrays_in_lockstep() {
        let opaque = flat_material([1.0; 4]);
        let tinted = flat_material([0.5; 4]);
        let mut builder = PackedTrianglesBuilder::new();
        builder.add_triangle(&TexturedTriangle {
            origin: Point3::new(1.0, 0.0, 0.0),
            uv1: Point2::new(0.1, 0.0),
            ..unit_triangle(&opaque, false)
        });
        builder.add_triangle(&TexturedTriangle {
            origin: Point3::new(2.0, 0.0, 0.0),
            uv1: Point2::new(0.2, 0.0),
            ..unit_triangle(&tinted, true)
        });
        let mut triangles = builder.build();

        triangles.swap_records(0, 1);
        assert_eq!(triangles.points[0], 2.0);
        assert_eq!(triangles.uv[0], 0.2);
        assert_eq!(triangles.material_id(0), 1);
        assert!(triangles.is_double_sided(0));
        assert_eq!(triangles.points[GEOM_STRIDE], 1.0);
        assert!(!triangles.is_double_sided(1));

        triangles.move_record(0, 1);
        assert_eq!(triangles.points[GEOM_STRIDE], 2.0);
        assert_eq!(triangles.uv[UV_STRIDE], 0.2);
        assert_eq!(triangles.material_id(1), 1);
        assert!(triangles.is_double_sided(1));
    }
}
