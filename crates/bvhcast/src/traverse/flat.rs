//! Stack-based descent over the flattened node array.

use super::{cutoff, test_nearest, RawHit};
use crate::ray::Ray;
use crate::scene::LoadedScene;

pub(super) fn intersect_nearest(scene: &LoadedScene, ray: &Ray) -> Option<RawHit> {
    let flat = scene.flat_bvh();
    let nodes = flat.nodes();
    let (root_entry, _) = ray.intersect_aabb(&nodes.first()?.aabb)?;

    let mut best = None;
    let mut stack: Vec<(u32, f64)> = Vec::with_capacity(flat.depth() + 1);
    stack.push((0, root_entry));

    while let Some((idx, entry)) = stack.pop() {
        if entry > cutoff(ray, &best) {
            continue;
        }
        let node = &nodes[idx as usize];
        if node.is_leaf {
            for &id in flat.leaf_triangles(node) {
                test_nearest(scene, id, ray, &mut best);
            }
            continue;
        }

        let left = node.left_or_first;
        let right = node.right_or_count;
        let left_t = ray.intersect_aabb(&nodes[left as usize].aabb).map(|(t, _)| t);
        let right_t = ray.intersect_aabb(&nodes[right as usize].aabb).map(|(t, _)| t);
        // Push the far child first so the near one is popped next.
        match (left_t, right_t) {
            (Some(lt), Some(rt)) if rt < lt => {
                stack.push((left, lt));
                stack.push((right, rt));
            }
            (Some(lt), Some(rt)) => {
                stack.push((right, rt));
                stack.push((left, lt));
            }
            (Some(lt), None) => stack.push((left, lt)),
            (None, Some(rt)) => stack.push((right, rt)),
            (None, None) => {}
        }
    }
    best
}

pub(super) fn intersect_all(scene: &LoadedScene, ray: &Ray) -> Vec<RawHit> {
    let flat = scene.flat_bvh();
    let nodes = flat.nodes();
    let mut hits = Vec::new();
    if nodes.is_empty() {
        return hits;
    }

    let mut stack: Vec<u32> = Vec::with_capacity(flat.depth() + 1);
    stack.push(0);
    while let Some(idx) = stack.pop() {
        let node = &nodes[idx as usize];
        if ray.intersect_aabb(&node.aabb).is_none() {
            continue;
        }
        if node.is_leaf {
            for &id in flat.leaf_triangles(node) {
                if let Some((t, u, v)) = scene.triangles()[id as usize].intersect(ray) {
                    hits.push(RawHit { triangle: id, t, u, v });
                }
            }
        } else {
            stack.push(node.right_or_count);
            stack.push(node.left_or_first);
        }
    }
    hits
}
