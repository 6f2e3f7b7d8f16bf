//! Bounding Volume Hierarchy over the triangle soup.
//!
//! Built top-down with a bucketed Surface Area Heuristic along the longest
//! centroid axis, falling back to a median split when the SAH split leaves
//! a side empty. Construction is deterministic for a fixed triangle order.

use bvhcast_math::{axis_value, Aabb3, Point3};

use crate::triangle::Triangle;

/// Leaves hold at most this many triangles unless they cannot be split.
pub const MAX_LEAF_SIZE: usize = 4;

const NUM_BUCKETS: usize = 12;

/// Relative cost of visiting a node compared to one triangle test.
const TRAVERSAL_COST: f64 = 0.125;

/// A BVH node - either a leaf referencing triangles or an internal node.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node covering `order[first..first + count]`.
    Leaf {
        /// Tight bound of the leaf's triangles.
        aabb: Aabb3,
        /// First slot in the primitive order array.
        first: u32,
        /// Number of triangles.
        count: u32,
    },
    /// Internal node with two children.
    Internal {
        /// Union of the children's boxes.
        aabb: Aabb3,
        /// Split axis (0 = x, 1 = y, 2 = z); `left` holds the lower centroids.
        axis: u8,
        /// Left child node.
        left: Box<BvhNode>,
        /// Right child node.
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    /// Bounding box of this node.
    pub fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Shape statistics of a built hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BvhStats {
    /// Total node count.
    pub nodes: usize,
    /// Leaf count.
    pub leaves: usize,
    /// Depth of the deepest leaf (root = 1).
    pub depth: usize,
    /// Triangle count of the largest leaf.
    pub max_leaf_size: usize,
}

/// Bounding Volume Hierarchy over a triangle array.
///
/// Triangles are not reordered; leaves index into `order`, a permutation
/// of triangle ids.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    root: Option<BvhNode>,
    order: Vec<u32>,
}

struct PrimRef {
    index: u32,
    aabb: Aabb3,
    centroid: Point3,
}

impl Bvh {
    /// Build a BVH over `triangles`.
    pub fn build(triangles: &[Triangle]) -> Self {
        let mut prims: Vec<PrimRef> = triangles
            .iter()
            .enumerate()
            .map(|(i, t)| PrimRef {
                index: i as u32,
                aabb: t.aabb(),
                centroid: t.centroid(),
            })
            .collect();

        let root = if prims.is_empty() {
            None
        } else {
            Some(build_node(&mut prims, 0))
        };

        Self {
            root,
            order: prims.iter().map(|p| p.index).collect(),
        }
    }

    /// Root node, `None` for an empty hierarchy.
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Triangle ids in leaf order.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Triangle ids of a leaf.
    #[inline]
    pub fn leaf_triangles(&self, first: u32, count: u32) -> &[u32] {
        &self.order[first as usize..(first + count) as usize]
    }

    /// Count nodes and leaves, measure depth and largest leaf.
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(root) = &self.root {
            collect_stats(root, 1, &mut stats);
        }
        stats
    }

    /// Verify the containment invariants against the triangles the
    /// hierarchy was built from.
    ///
    /// Interior boxes must equal the union of their children, leaf boxes
    /// must be the tight bound of their triangles, and leaves must cover
    /// every triangle exactly once.
    pub fn check_invariants(&self, triangles: &[Triangle]) -> Result<(), String> {
        if self.order.len() != triangles.len() {
            return Err(format!(
                "order has {} entries for {} triangles",
                self.order.len(),
                triangles.len()
            ));
        }
        let mut seen = vec![false; triangles.len()];
        for &i in &self.order {
            let slot = seen
                .get_mut(i as usize)
                .ok_or_else(|| format!("triangle id {i} out of range"))?;
            if *slot {
                return Err(format!("triangle {i} referenced twice"));
            }
            *slot = true;
        }
        let mut next = 0u32;
        if let Some(root) = &self.root {
            self.check_node(root, triangles, &mut next)?;
        }
        if next as usize != triangles.len() {
            return Err(format!("leaves cover {next} of {} triangles", triangles.len()));
        }
        Ok(())
    }

    fn check_node(&self, node: &BvhNode, triangles: &[Triangle], next: &mut u32) -> Result<(), String> {
        match node {
            BvhNode::Leaf { aabb, first, count } => {
                if *first != *next {
                    return Err(format!("leaf starts at {first}, expected {next}"));
                }
                *next += count;
                let mut tight = Aabb3::empty();
                for &i in self.leaf_triangles(*first, *count) {
                    tight.include_aabb(&triangles[i as usize].aabb());
                }
                if tight != *aabb {
                    return Err(format!("leaf at {first} is not tight: {aabb:?} vs {tight:?}"));
                }
            }
            BvhNode::Internal {
                aabb, left, right, ..
            } => {
                self.check_node(left, triangles, next)?;
                self.check_node(right, triangles, next)?;
                let union = left.aabb().union(right.aabb());
                if union != *aabb {
                    return Err(format!("internal box {aabb:?} differs from child union {union:?}"));
                }
            }
        }
        Ok(())
    }

    /// Flatten into a depth-first node array.
    ///
    /// Internal nodes store both child indices; leaves store their slot
    /// range in the primitive order array.
    #[cfg(feature = "accel")]
    pub fn flatten(&self) -> FlatBvh {
        let mut nodes = Vec::new();
        if let Some(root) = &self.root {
            flatten_node(root, &mut nodes);
        }
        FlatBvh {
            nodes,
            order: self.order.clone(),
            depth: self.stats().depth,
        }
    }
}

fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
    stats.nodes += 1;
    match node {
        BvhNode::Leaf { count, .. } => {
            stats.leaves += 1;
            stats.depth = stats.depth.max(depth);
            stats.max_leaf_size = stats.max_leaf_size.max(*count as usize);
        }
        BvhNode::Internal { left, right, .. } => {
            collect_stats(left, depth + 1, stats);
            collect_stats(right, depth + 1, stats);
        }
    }
}

/// Build a BVH node recursively over `prims`, which occupy
/// `order[offset..offset + prims.len()]`.
fn build_node(prims: &mut [PrimRef], offset: usize) -> BvhNode {
    let mut aabb = Aabb3::empty();
    let mut centroid_bounds = Aabb3::empty();
    for p in prims.iter() {
        aabb.include_aabb(&p.aabb);
        centroid_bounds.include_point(&p.centroid);
    }

    let leaf = |aabb| BvhNode::Leaf {
        aabb,
        first: offset as u32,
        count: prims.len() as u32,
    };

    if prims.len() <= MAX_LEAF_SIZE {
        return leaf(aabb);
    }

    let axis = centroid_bounds.longest_axis();
    let extent = centroid_bounds.max_on(axis) - centroid_bounds.min_on(axis);
    // Coincident centroids: no plane separates them.
    if !(extent > 0.0) {
        return leaf(aabb);
    }

    let mid = match find_sah_split(prims, axis, &centroid_bounds, &aabb) {
        Some(pos) => partition(prims, axis, pos),
        None => 0,
    };
    let mid = if mid == 0 || mid == prims.len() {
        median_split(prims, axis)
    } else {
        mid
    };

    let (left_prims, right_prims) = prims.split_at_mut(mid);
    BvhNode::Internal {
        aabb,
        axis: axis as u8,
        left: Box::new(build_node(left_prims, offset)),
        right: Box::new(build_node(right_prims, offset + mid)),
    }
}

/// Best SAH split position along `axis`, if any split separates the set.
fn find_sah_split(prims: &[PrimRef], axis: usize, centroid_bounds: &Aabb3, bounds: &Aabb3) -> Option<f64> {
    let axis_min = centroid_bounds.min_on(axis);
    let axis_extent = centroid_bounds.max_on(axis) - axis_min;

    let mut bucket_counts = [0usize; NUM_BUCKETS];
    let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];
    for p in prims {
        let c = axis_value(&p.centroid, axis);
        let b = (((c - axis_min) / axis_extent) * NUM_BUCKETS as f64) as usize;
        let b = b.min(NUM_BUCKETS - 1);
        bucket_counts[b] += 1;
        bucket_bounds[b].include_aabb(&p.aabb);
    }

    // Suffix sweep so each split is evaluated in O(1).
    let mut right_area = [0.0; NUM_BUCKETS];
    let mut right_count = [0usize; NUM_BUCKETS];
    let mut acc_bounds = Aabb3::empty();
    let mut acc_count = 0;
    for i in (1..NUM_BUCKETS).rev() {
        acc_bounds.include_aabb(&bucket_bounds[i]);
        acc_count += bucket_counts[i];
        right_area[i] = acc_bounds.surface_area();
        right_count[i] = acc_count;
    }

    let total_area = bounds.surface_area();
    let total_area = if total_area > 0.0 { total_area } else { 1.0 };

    let mut best: Option<(f64, usize)> = None;
    let mut left_bounds = Aabb3::empty();
    let mut left_count = 0;
    for split in 1..NUM_BUCKETS {
        left_bounds.include_aabb(&bucket_bounds[split - 1]);
        left_count += bucket_counts[split - 1];
        if left_count == 0 || right_count[split] == 0 {
            continue;
        }
        let cost = TRAVERSAL_COST
            + (left_bounds.surface_area() * left_count as f64
                + right_area[split] * right_count[split] as f64)
                / total_area;
        if best.map_or(true, |(c, _)| cost < c) {
            best = Some((cost, split));
        }
    }

    best.map(|(_, split)| axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent)
}

/// Partition by centroid: `< pos` to the left. Returns the left count.
fn partition(prims: &mut [PrimRef], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = prims.len();
    while left < right {
        if axis_value(&prims[left].centroid, axis) < pos {
            left += 1;
        } else {
            right -= 1;
            prims.swap(left, right);
        }
    }
    left
}

/// Sort by centroid along `axis` (ties by triangle id) and split in half.
fn median_split(prims: &mut [PrimRef], axis: usize) -> usize {
    prims.sort_unstable_by(|a, b| {
        axis_value(&a.centroid, axis)
            .total_cmp(&axis_value(&b.centroid, axis))
            .then_with(|| a.index.cmp(&b.index))
    });
    prims.len() / 2
}

/// A node of the flattened hierarchy.
#[cfg(feature = "accel")]
#[derive(Debug, Clone, Copy)]
pub struct FlatNode {
    /// Bounding box.
    pub aabb: Aabb3,
    /// Leaf: first order slot. Internal: left child index.
    pub left_or_first: u32,
    /// Leaf: triangle count. Internal: right child index.
    pub right_or_count: u32,
    /// Split axis of an internal node.
    pub axis: u8,
    /// Leaf flag.
    pub is_leaf: bool,
}

/// Depth-first array form of a [`Bvh`], traversed with an explicit stack.
#[cfg(feature = "accel")]
#[derive(Debug, Clone, Default)]
pub struct FlatBvh {
    nodes: Vec<FlatNode>,
    order: Vec<u32>,
    depth: usize,
}

#[cfg(feature = "accel")]
impl FlatBvh {
    /// Nodes; index 0 is the root.
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// Triangle ids of a leaf node.
    #[inline]
    pub fn leaf_triangles(&self, node: &FlatNode) -> &[u32] {
        let first = node.left_or_first as usize;
        &self.order[first..first + node.right_or_count as usize]
    }

    /// Depth of the deepest leaf; bounds the traversal stack.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(feature = "accel")]
fn flatten_node(node: &BvhNode, nodes: &mut Vec<FlatNode>) -> u32 {
    let idx = nodes.len();
    match node {
        BvhNode::Leaf { aabb, first, count } => {
            nodes.push(FlatNode {
                aabb: *aabb,
                left_or_first: *first,
                right_or_count: *count,
                axis: 0,
                is_leaf: true,
            });
        }
        BvhNode::Internal {
            aabb,
            axis,
            left,
            right,
        } => {
            nodes.push(FlatNode {
                aabb: *aabb,
                left_or_first: 0,
                right_or_count: 0,
                axis: *axis,
                is_leaf: false,
            });
            let left_idx = flatten_node(left, nodes);
            let right_idx = flatten_node(right, nodes);
            nodes[idx].left_or_first = left_idx;
            nodes[idx].right_or_count = right_idx;
        }
    }
    idx as u32
}
