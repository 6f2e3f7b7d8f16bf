//! BVH traversal kernels.
//!
//! A [`Kernel`] is the concrete traversal a [`Backend`] resolves to. It is
//! chosen once by [`crate::backend::select`] and matched per ray or per
//! packet, never through a trait object.

#[cfg(feature = "accel")]
mod flat;
#[cfg(feature = "simd")]
mod packet;
mod tree;

use crate::backend::Backend;
use crate::ray::Ray;
use crate::scene::LoadedScene;

/// A triangle hit before resolution into a [`crate::HitResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    /// Triangle id in the scene.
    pub triangle: u32,
    /// Ray parameter of the hit.
    pub t: f64,
    /// Barycentric weight of the triangle's second vertex.
    pub u: f64,
    /// Barycentric weight of the triangle's third vertex.
    pub v: f64,
}

/// Traversal implementation behind a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Recursive descent over the node tree.
    Tree,
    /// Stack-based descent over the flattened node array.
    #[cfg(feature = "accel")]
    Flat,
    /// 4-ray packets over the flattened node array.
    #[cfg(feature = "simd")]
    Packet4,
    /// 8-ray packets over the flattened node array.
    #[cfg(feature = "simd")]
    Packet8,
}

impl Kernel {
    /// The backend this kernel implements.
    pub fn backend(self) -> Backend {
        match self {
            Kernel::Tree => Backend::Scalar,
            #[cfg(feature = "accel")]
            Kernel::Flat => Backend::Accelerated,
            #[cfg(feature = "simd")]
            Kernel::Packet4 => Backend::Simd4,
            #[cfg(feature = "simd")]
            Kernel::Packet8 => Backend::Simd8,
        }
    }

    /// Number of rays traversed together.
    pub fn width(self) -> usize {
        self.backend().width()
    }

    /// Nearest hit along `ray` within its window.
    pub fn intersect_nearest(self, scene: &LoadedScene, ray: &Ray) -> Option<RawHit> {
        match self {
            Kernel::Tree => tree::intersect_nearest(scene, ray),
            #[cfg(feature = "accel")]
            Kernel::Flat => flat::intersect_nearest(scene, ray),
            #[cfg(feature = "simd")]
            Kernel::Packet4 => packet::intersect_nearest::<4>(scene, &single_lane(ray))[0],
            #[cfg(feature = "simd")]
            Kernel::Packet8 => packet::intersect_nearest::<8>(scene, &single_lane(ray))[0],
        }
    }

    /// Every hit along `ray` within its window, sorted by `t`.
    ///
    /// Packet kernels answer this with the flat single-ray descent.
    pub fn intersect_all(self, scene: &LoadedScene, ray: &Ray) -> Vec<RawHit> {
        let mut hits = match self {
            Kernel::Tree => tree::intersect_all(scene, ray),
            #[cfg(feature = "accel")]
            _ => flat::intersect_all(scene, ray),
        };
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        hits
    }

    /// Nearest hits for up to `width()` rays; `None` lanes stay `None`.
    ///
    /// `out` must be as long as `rays`.
    pub(crate) fn intersect_chunk(self, scene: &LoadedScene, rays: &[Option<Ray>], out: &mut [Option<RawHit>]) {
        debug_assert_eq!(rays.len(), out.len());
        match self {
            #[cfg(feature = "simd")]
            Kernel::Packet4 => packet_chunk::<4>(scene, rays, out),
            #[cfg(feature = "simd")]
            Kernel::Packet8 => packet_chunk::<8>(scene, rays, out),
            _ => {
                for (ray, hit) in rays.iter().zip(out.iter_mut()) {
                    *hit = ray.as_ref().and_then(|r| self.intersect_nearest(scene, r));
                }
            }
        }
    }
}

#[cfg(feature = "simd")]
fn single_lane<const K: usize>(ray: &Ray) -> [Option<Ray>; K] {
    let mut lanes = [None; K];
    lanes[0] = Some(*ray);
    lanes
}

/// Pad a short chunk with inert lanes and keep only the real results.
#[cfg(feature = "simd")]
fn packet_chunk<const K: usize>(scene: &LoadedScene, rays: &[Option<Ray>], out: &mut [Option<RawHit>]) {
    for (rays, out) in rays.chunks(K).zip(out.chunks_mut(K)) {
        let mut lanes = [None; K];
        lanes[..rays.len()].copy_from_slice(rays);
        let hits = packet::intersect_nearest::<K>(scene, &lanes);
        out.copy_from_slice(&hits[..out.len()]);
    }
}

/// Test one triangle and keep it if it beats the current best.
///
/// Strictly closer only: on equal `t` the first triangle tested wins.
#[inline]
fn test_nearest(scene: &LoadedScene, id: u32, ray: &Ray, best: &mut Option<RawHit>) {
    if let Some((t, u, v)) = scene.triangles()[id as usize].intersect(ray) {
        if best.map_or(true, |b| t < b.t) {
            *best = Some(RawHit { triangle: id, t, u, v });
        }
    }
}

/// Upper bound for subtree entry distances given the current best hit.
#[inline]
fn cutoff(ray: &Ray, best: &Option<RawHit>) -> f64 {
    best.map_or(ray.max_dist, |b| b.t)
}
