//! Packet traversal: K rays descend the flattened BVH together.
//!
//! Ray data is stored lane-wise (`[f64; K]` per component) so the box test
//! runs as straight-line loops over the lanes, which the compiler lowers to
//! SSE/AVX/NEON vectors. A bit mask tracks the lanes still live at each
//! node. Inert lanes start masked off and never influence the others.
//!
//! Children are visited in the order given by the first live lane's
//! direction sign on the node's split axis, not by each lane's entry
//! distance. Every lane still prunes against its own best hit, so the
//! nearest distance per lane is exact. When two triangles are hit at exactly
//! the same distance (a ray grazing a shared edge), a lane may report a
//! different one of them than the single-ray kernels do.

use bvhcast_math::Aabb3;

use super::RawHit;
use crate::ray::Ray;
use crate::scene::LoadedScene;

/// Lane-wise ray data for one packet.
struct Lanes<const K: usize> {
    origin: [[f64; K]; 3],
    inv_dir: [[f64; K]; 3],
    negative: [[bool; K]; 3],
    min_dist: [f64; K],
    max_dist: [f64; K],
}

impl<const K: usize> Lanes<K> {
    /// Transpose the rays into lanes; returns the mask of real lanes.
    fn load(rays: &[Option<Ray>; K]) -> (Self, u32) {
        let mut lanes = Self {
            origin: [[0.0; K]; 3],
            inv_dir: [[f64::INFINITY; K]; 3],
            negative: [[false; K]; 3],
            min_dist: [0.0; K],
            max_dist: [0.0; K],
        };
        let mut mask = 0;
        for (l, ray) in rays.iter().enumerate() {
            let Some(ray) = ray else { continue };
            mask |= 1 << l;
            let inv = ray.inv_direction();
            for axis in 0..3 {
                lanes.origin[axis][l] = ray.origin[axis];
                lanes.inv_dir[axis][l] = inv[axis];
                lanes.negative[axis][l] = inv[axis] < 0.0;
            }
            lanes.min_dist[l] = ray.min_dist;
            lanes.max_dist[l] = ray.max_dist;
        }
        (lanes, mask)
    }

    /// Slab test of all lanes against one box.
    ///
    /// Same operations in the same order as [`Ray::intersect_aabb`], so a
    /// lane decides exactly as the single-ray test would. Returns the entry
    /// distances and the subset of `mask` that overlaps the box.
    #[inline]
    fn intersect_aabb(&self, aabb: &Aabb3, mask: u32) -> ([f64; K], u32) {
        let mut t_min = self.min_dist;
        let mut t_max = self.max_dist;
        for axis in 0..3 {
            let lo = aabb.min_on(axis);
            let hi = aabb.max_on(axis);
            let origin = &self.origin[axis];
            let inv = &self.inv_dir[axis];
            let negative = &self.negative[axis];
            for l in 0..K {
                let (near, far) = if negative[l] { (hi, lo) } else { (lo, hi) };
                t_min[l] = t_min[l].max((near - origin[l]) * inv[l]);
                t_max[l] = t_max[l].min((far - origin[l]) * inv[l]);
            }
        }
        let mut hit = 0;
        for l in 0..K {
            if t_max[l] >= t_min[l] {
                hit |= 1 << l;
            }
        }
        (t_min, hit & mask)
    }
}

/// Indices of the set bits of `mask`, lowest first.
#[inline]
fn lanes_of(mut mask: u32) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let l = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        Some(l)
    })
}

/// Nearest hit for each lane; `None` lanes produce `None`.
pub(super) fn intersect_nearest<const K: usize>(scene: &LoadedScene, rays: &[Option<Ray>; K]) -> [Option<RawHit>; K] {
    debug_assert!(K <= 32, "lane mask is a u32");
    let mut hits: [Option<RawHit>; K] = [None; K];
    let flat = scene.flat_bvh();
    let nodes = flat.nodes();
    let (lanes, active) = Lanes::load(rays);
    if nodes.is_empty() || active == 0 {
        return hits;
    }

    let mut stack: Vec<(u32, u32)> = Vec::with_capacity(flat.depth() + 1);
    stack.push((0, active));

    while let Some((idx, mask)) = stack.pop() {
        let node = &nodes[idx as usize];
        let (entry, overlap) = lanes.intersect_aabb(&node.aabb, mask);
        let mut live = 0u32;
        for l in lanes_of(overlap) {
            let cutoff = hits[l].map_or(lanes.max_dist[l], |h| h.t);
            if entry[l] <= cutoff {
                live |= 1 << l;
            }
        }
        if live == 0 {
            continue;
        }

        if node.is_leaf {
            for &id in flat.leaf_triangles(node) {
                let triangle = &scene.triangles()[id as usize];
                for l in lanes_of(live) {
                    let Some(ray) = &rays[l] else { continue };
                    if let Some((t, u, v)) = triangle.intersect(ray) {
                        if hits[l].map_or(true, |h| t < h.t) {
                            hits[l] = Some(RawHit { triangle: id, t, u, v });
                        }
                    }
                }
            }
            continue;
        }

        // Order children by the direction sign of the first live lane on
        // the split axis; the left child holds the lower centroids.
        let first = live.trailing_zeros() as usize;
        let (near, far) = if lanes.negative[node.axis as usize][first] {
            (node.right_or_count, node.left_or_first)
        } else {
            (node.left_or_first, node.right_or_count)
        };
        stack.push((far, live));
        stack.push((near, live));
    }
    hits
}
