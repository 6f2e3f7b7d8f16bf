//! Recursive descent over the node tree.

use super::{cutoff, test_nearest, RawHit};
use crate::bvh::BvhNode;
use crate::ray::Ray;
use crate::scene::LoadedScene;

pub(super) fn intersect_nearest(scene: &LoadedScene, ray: &Ray) -> Option<RawHit> {
    let root = scene.bvh().root()?;
    let (entry, _) = ray.intersect_aabb(root.aabb())?;
    let mut best = None;
    visit_nearest(scene, root, entry, ray, &mut best);
    best
}

fn visit_nearest(scene: &LoadedScene, node: &BvhNode, entry: f64, ray: &Ray, best: &mut Option<RawHit>) {
    if entry > cutoff(ray, best) {
        return;
    }
    match node {
        BvhNode::Leaf { first, count, .. } => {
            for &id in scene.bvh().leaf_triangles(*first, *count) {
                test_nearest(scene, id, ray, best);
            }
        }
        BvhNode::Internal { left, right, .. } => {
            let left_t = ray.intersect_aabb(left.aabb()).map(|(t, _)| t);
            let right_t = ray.intersect_aabb(right.aabb()).map(|(t, _)| t);
            match (left_t, right_t) {
                (Some(lt), Some(rt)) => {
                    // Near child first; the far one is re-checked against the
                    // best hit found meanwhile.
                    if rt < lt {
                        visit_nearest(scene, right, rt, ray, best);
                        visit_nearest(scene, left, lt, ray, best);
                    } else {
                        visit_nearest(scene, left, lt, ray, best);
                        visit_nearest(scene, right, rt, ray, best);
                    }
                }
                (Some(lt), None) => visit_nearest(scene, left, lt, ray, best),
                (None, Some(rt)) => visit_nearest(scene, right, rt, ray, best),
                (None, None) => {}
            }
        }
    }
}

pub(super) fn intersect_all(scene: &LoadedScene, ray: &Ray) -> Vec<RawHit> {
    let mut hits = Vec::new();
    if let Some(root) = scene.bvh().root() {
        visit_all(scene, root, ray, &mut hits);
    }
    hits
}

fn visit_all(scene: &LoadedScene, node: &BvhNode, ray: &Ray, hits: &mut Vec<RawHit>) {
    if ray.intersect_aabb(node.aabb()).is_none() {
        return;
    }
    match node {
        BvhNode::Leaf { first, count, .. } => {
            for &id in scene.bvh().leaf_triangles(*first, *count) {
                if let Some((t, u, v)) = scene.triangles()[id as usize].intersect(ray) {
                    hits.push(RawHit { triangle: id, t, u, v });
                }
            }
        }
        BvhNode::Internal { left, right, .. } => {
            visit_all(scene, left, ray, hits);
            visit_all(scene, right, ray, hits);
        }
    }
}
