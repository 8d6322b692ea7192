//! Flat-table SAH bounding volume hierarchy: construction and traversal.
//!
//! Construction is an iterative state machine over two explicit stacks
//! (pending work items and completed node indices) instead of recursion,
//! so tree depth never touches the call stack. Each split sorts the
//! range along its widest axis and sweeps a surface-area cost over every
//! split position. The finished table is read-only; traversal walks it
//! with a second explicit stack and a branchless slab test per child.

use bytemuck::{Pod, Zeroable};

use raypack_math::{Aabb, OFFSET};

use crate::error::Result;
use crate::ray::Ray;
use crate::settings::BvhSettings;
use crate::strategy::{NullProgress, ProgressSink};
use crate::triangles::PackedTriangles;

/// Ranges with fewer triangles than this become leaves unconditionally.
pub const SPLIT_LIMIT: usize = 5;

/// One packed node of the flat table: two child slots and a bounding
/// box, 32 bytes, suitable for direct GPU upload.
///
/// A negative `left` marks a leaf: the primitive range starts at
/// `-left - 1` and spans `right` triangles. Otherwise `left` and
/// `right` index the child nodes in the same table and the box is the
/// union of both children's boxes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    /// Left child index, or the negative-encoded range start of a leaf.
    pub left: i32,
    /// Right child index, or the triangle count of a leaf.
    pub right: i32,
    /// Bounding box as `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub bounds: [f32; 6],
}

impl BvhNode {
    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.left < 0
    }

    /// Decoded primitive range of a leaf node, `None` for branches.
    pub fn primitive_range(&self) -> Option<std::ops::Range<usize>> {
        self.is_leaf().then(|| {
            let from = (-self.left - 1) as usize;
            from..from + self.right as usize
        })
    }
}

/// Work item of the construction state machine.
enum Action {
    /// Process a triangle range: emit a leaf or split it further.
    Push { from: usize, to: usize },
    /// Combine the two most recently completed nodes into a branch.
    Merge,
}

/// A static BVH over a packed triangle store.
///
/// Built once, immutable afterwards; concurrent read-only queries are
/// safe as long as each carries its own [`Ray`] state.
#[derive(Debug, Clone)]
pub struct Bvh {
    triangles: PackedTriangles,
    nodes: Vec<BvhNode>,
    root: i32,
}

impl Bvh {
    /// Build a BVH over `triangles` with default settings.
    pub fn build(triangles: PackedTriangles) -> Self {
        Self::construct(triangles, &BvhSettings::default(), &mut NullProgress)
    }

    /// Build a BVH with explicit settings, reporting progress at
    /// leaf-creation granularity (the 500..1000 band of a 1000-step
    /// task).
    pub fn build_with_settings(
        triangles: PackedTriangles,
        settings: &BvhSettings,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self::construct(triangles, settings, progress))
    }

    fn construct(
        triangles: PackedTriangles,
        settings: &BvhSettings,
        progress: &mut dyn ProgressSink,
    ) -> Self {
        let count = triangles.count();
        let mut bvh = Self {
            triangles,
            nodes: Vec::new(),
            root: 0,
        };

        let mut actions = vec![Action::Push { from: 0, to: count }];
        let mut completed: Vec<i32> = Vec::new();
        let mut done = 0;

        while let Some(action) = actions.pop() {
            match action {
                Action::Merge => {
                    let index = bvh.nodes.len() as i32;
                    let left = completed.pop().expect("merge without a left child");
                    let right = completed.pop().expect("merge without a right child");
                    let lb = bvh.nodes[left as usize].bounds;
                    let rb = bvh.nodes[right as usize].bounds;
                    bvh.nodes.push(BvhNode {
                        left,
                        right,
                        bounds: [
                            lb[0].min(rb[0]),
                            lb[1].max(rb[1]),
                            lb[2].min(rb[2]),
                            lb[3].max(rb[3]),
                            lb[4].min(rb[4]),
                            lb[5].max(rb[5]),
                        ],
                    });
                    completed.push(index);
                }
                Action::Push { from, to } => {
                    if to - from < settings.split_limit {
                        let index = bvh.nodes.len() as i32;
                        let aabb = bvh.triangles.compute_aabb(from, to);
                        bvh.nodes.push(BvhNode {
                            left: -(from as i32) - 1,
                            right: (to - from) as i32,
                            bounds: [
                                aabb.xmin as f32,
                                aabb.xmax as f32,
                                aabb.ymin as f32,
                                aabb.ymax as f32,
                                aabb.zmin as f32,
                                aabb.zmax as f32,
                            ],
                        });
                        completed.push(index);

                        done += to - from;
                        if count > 0 {
                            let value = (done as f64 * 500.0 / count as f64) as u32 + 500;
                            progress.update_interval(value, 1);
                        }
                    } else {
                        bvh.split(from, to, settings, &mut actions);
                    }
                }
            }
        }

        bvh.root = completed.pop().expect("construction left no root");
        log::debug!(
            "built packed SAH BVH: {} triangles, {} nodes",
            count,
            bvh.nodes.len()
        );
        bvh
    }

    /// Split `[from, to)` at the SAH-optimal position along its widest
    /// axis and queue both halves plus the merge that joins them.
    fn split(&mut self, from: usize, to: usize, settings: &BvhSettings, actions: &mut Vec<Action>) {
        let aabb = self.triangles.compute_aabb(from, to);
        let xl = aabb.xmax - aabb.xmin;
        let yl = aabb.ymax - aabb.ymin;
        let zl = aabb.zmax - aabb.zmin;
        let axis = if xl >= yl && xl >= zl {
            0
        } else if yl >= zl {
            1
        } else {
            2
        };

        let end = to - from;
        self.triangles
            .sort_with_crossover(from, to, axis, settings.sort_crossover);

        // Prefix and suffix sweeps of the running box surface area.
        let mut sl = vec![0.0f32; end];
        let mut sr = vec![0.0f32; end];
        let mut bounds = Aabb::empty();
        for i in 0..end - 1 {
            self.triangles.expand_aabb(&mut bounds, from + i);
            sl[i] = surface_area(&bounds);
        }
        let mut bounds = Aabb::empty();
        for i in (1..end).rev() {
            self.triangles.expand_aabb(&mut bounds, from + i);
            sr[i - 1] = surface_area(&bounds);
        }

        // Strict minimum keeps the leftmost position on cost ties, for
        // reproducible trees.
        let mut cmin = f32::INFINITY;
        let mut split = 0;
        for i in 0..end - 1 {
            let cost = sl[i] * (i + 1) as f32 + sr[i] * (end - i - 1) as f32;
            if cost < cmin {
                cmin = cost;
                split = i;
            }
        }
        let split = split + 1;

        actions.push(Action::Merge);
        actions.push(Action::Push {
            from,
            to: from + split,
        });
        actions.push(Action::Push {
            from: from + split,
            to,
        });
    }

    /// Find the closest non-transparent hit along `ray`.
    ///
    /// Returns whether any triangle committed; on success `ray` carries
    /// the hit distance, texture coordinates, color, material, and
    /// normal. Every primitive of a visited leaf is tested, since each
    /// test may tighten the search window.
    pub fn closest_intersection(&self, ray: &mut Ray) -> bool {
        let mut hit = false;
        let mut current = self.root;
        let mut pending: Vec<i32> = Vec::new();

        loop {
            let node = self.nodes[current as usize];
            if let Some(range) = node.primitive_range() {
                for index in range {
                    hit |= self.triangles.intersect(index, ray);
                }

                match pending.pop() {
                    Some(next) => current = next,
                    None => break,
                }
            } else {
                let near_left = node_distance(ray, &self.nodes[node.left as usize].bounds)
                    .filter(|&t| t <= ray.t);
                let near_right = node_distance(ray, &self.nodes[node.right as usize].bounds)
                    .filter(|&t| t <= ray.t);

                match (near_left, near_right) {
                    (None, None) => match pending.pop() {
                        Some(next) => current = next,
                        None => break,
                    },
                    (Some(_), None) => current = node.left,
                    (None, Some(_)) => current = node.right,
                    (Some(left_t), Some(right_t)) => {
                        if left_t < right_t {
                            pending.push(node.right);
                            current = node.left;
                        } else {
                            pending.push(node.left);
                            current = node.right;
                        }
                    }
                }
            }
        }

        hit
    }

    /// The triangle store, in its final construction order.
    pub fn triangles(&self) -> &PackedTriangles {
        &self.triangles
    }

    /// The flat node table.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Number of nodes in the table.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the root node.
    pub fn root_index(&self) -> i32 {
        self.root
    }

    /// The node table as raw bytes, for upload to GPU buffers.
    pub fn nodes_as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}

/// Half of the box surface area; only the relative magnitude matters to
/// the cost sweep.
fn surface_area(aabb: &Aabb) -> f32 {
    let dx = aabb.xmax - aabb.xmin;
    let dy = aabb.ymax - aabb.ymin;
    let dz = aabb.zmax - aabb.zmin;
    (dx * dy + dx * dz + dy * dz) as f32
}

/// Branchless slab test against a packed node box, with the reciprocal
/// direction cached on the ray.
///
/// An origin inside the box is distance zero. Otherwise the box is hit
/// at `tmin` iff `tmin <= tmax + OFFSET` (slack for grazing and flat
/// boxes) and `tmin >= 0`.
fn node_distance(ray: &Ray, bounds: &[f32; 6]) -> Option<f64> {
    let aabb = Aabb::new(
        bounds[0] as f64,
        bounds[1] as f64,
        bounds[2] as f64,
        bounds[3] as f64,
        bounds[4] as f64,
        bounds[5] as f64,
    );
    if aabb.contains_point(&ray.origin) {
        return Some(0.0);
    }

    let tx1 = (aabb.xmin - ray.origin.x) * ray.inv_direction.x;
    let tx2 = (aabb.xmax - ray.origin.x) * ray.inv_direction.x;
    let ty1 = (aabb.ymin - ray.origin.y) * ray.inv_direction.y;
    let ty2 = (aabb.ymax - ray.origin.y) * ray.inv_direction.y;
    let tz1 = (aabb.zmin - ray.origin.z) * ray.inv_direction.z;
    let tz2 = (aabb.zmax - ray.origin.z) * ray.inv_direction.z;

    let tmin = tx1.min(tx2).max(ty1.min(ty2)).max(tz1.min(tz2));
    let tmax = tx1.max(tx2).min(ty1.max(ty2)).min(tz1.max(tz2));

    (tmin <= tmax + OFFSET && tmin >= 0.0).then_some(tmin)
}
