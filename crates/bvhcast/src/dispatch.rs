//! Batch dispatch of many rays over one kernel.
//!
//! Rays are cut into chunks of the kernel's width. Chunks run in order on the
//! calling thread or fan out over rayon's pool; either way results land at
//! the input positions, so output order and length always match the input.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::ray::Ray;
use crate::resolve::{resolve, HitResult};
use crate::scene::LoadedScene;
use crate::traverse::{Kernel, RawHit};

/// Widest kernel; sizes the per-chunk scratch buffer.
const MAX_WIDTH: usize = 8;

/// How a batch is run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions<'a> {
    /// Spread chunks over worker threads.
    pub parallel: bool,
    /// Set to stop the batch; checked before each chunk starts.
    pub cancel: Option<&'a AtomicBool>,
}

/// Per-ray results of a batch.
#[derive(Debug, Clone, Default)]
pub struct Dispatched {
    /// One result per input ray, in input order.
    pub hits: Vec<HitResult>,
    /// True if some chunks were skipped because the batch was cancelled.
    pub cancelled: bool,
}

/// Cast every ray; `None` entries are inert and resolve to misses.
pub fn dispatch(scene: &LoadedScene, rays: &[Option<Ray>], kernel: Kernel, options: &DispatchOptions<'_>) -> Dispatched {
    let width = kernel.width().clamp(1, MAX_WIDTH);
    let mut hits = vec![HitResult::miss(); rays.len()];
    let skipped = AtomicBool::new(false);

    let run_chunk = |(rays, out): (&[Option<Ray>], &mut [HitResult])| {
        if options.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            skipped.store(true, Ordering::Relaxed);
            return;
        }
        let mut raw: [Option<RawHit>; MAX_WIDTH] = [None; MAX_WIDTH];
        let raw = &mut raw[..rays.len()];
        kernel.intersect_chunk(scene, rays, raw);
        for ((ray, raw), out) in rays.iter().zip(raw.iter()).zip(out.iter_mut()) {
            if let (Some(ray), Some(raw)) = (ray, raw) {
                *out = resolve(scene, ray, raw);
            }
        }
    };

    if options.parallel {
        rays.par_chunks(width)
            .zip(hits.par_chunks_mut(width))
            .for_each(run_chunk);
    } else {
        rays.chunks(width).zip(hits.chunks_mut(width)).for_each(run_chunk);
    }

    let cancelled = skipped.into_inner();
    if cancelled {
        log::info!("batch of {} rays cancelled before completion", rays.len());
    }
    Dispatched { hits, cancelled }
}

/// Structure-of-arrays form of a batch, one entry per ray in every array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    /// Hit flags.
    pub hits: Vec<bool>,
    /// Hit points (zero on miss).
    pub points: Vec<[f64; 3]>,
    /// Unit normals (zero on miss).
    pub normals: Vec<[f64; 3]>,
    /// Surface parameters (zero on miss).
    pub uvs: Vec<[f64; 2]>,
    /// Ray parameters (zero on miss).
    pub ws: Vec<f64>,
    /// Face ids, `-1` on miss.
    pub face_ids: Vec<i64>,
    /// True if the batch was cancelled and some rays were never cast.
    pub cancelled: bool,
}

impl BatchResult {
    /// Number of rays in the batch.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of rays that hit.
    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|h| **h).count()
    }
}

impl From<&[HitResult]> for BatchResult {
    fn from(results: &[HitResult]) -> Self {
        let n = results.len();
        let mut batch = BatchResult {
            hits: Vec::with_capacity(n),
            points: Vec::with_capacity(n),
            normals: Vec::with_capacity(n),
            uvs: Vec::with_capacity(n),
            ws: Vec::with_capacity(n),
            face_ids: Vec::with_capacity(n),
            cancelled: false,
        };
        for r in results {
            batch.hits.push(r.valid);
            batch.points.push(r.point.coords.into());
            batch.normals.push(r.normal.into());
            batch.uvs.push(r.uv.coords.into());
            batch.ws.push(r.w);
            batch.face_ids.push(if r.valid { r.face_id as i64 } else { -1 });
        }
        batch
    }
}

impl From<Dispatched> for BatchResult {
    fn from(d: Dispatched) -> Self {
        let mut batch = BatchResult::from(d.hits.as_slice());
        batch.cancelled = d.cancelled;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{available_backends, select};
    use crate::scene::load;
    use bvhcast_math::{Point3, Vec3};
    use bvhcast_shape::make_sphere;

    fn scene() -> LoadedScene {
        let mut shape = make_sphere(50.0).unwrap();
        load(&mut shape, 0.001, 0.1).unwrap()
    }

    /// Alternating hits and misses, with every third ray inert.
    fn rays(n: usize) -> Vec<Option<Ray>> {
        (0..n)
            .map(|i| {
                if i % 3 == 2 {
                    return None;
                }
                let x = if i % 2 == 0 { (i as f64) * 0.1 } else { 500.0 + i as f64 };
                Some(Ray::new(Point3::new(x, 0.0, 100.0), -Vec3::z()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_order_and_length_preserved() {
        let scene = scene();
        for backend in available_backends() {
            let kernel = select(backend).unwrap();
            for n in [0, 1, 5, 9, 100] {
                let rays = rays(n);
                for parallel in [false, true] {
                    let out = dispatch(&scene, &rays, kernel, &DispatchOptions { parallel, cancel: None });
                    assert_eq!(out.hits.len(), n);
                    assert!(!out.cancelled);
                    for (i, (ray, hit)) in rays.iter().zip(&out.hits).enumerate() {
                        let expected = ray.as_ref().and_then(|r| kernel.intersect_nearest(&scene, r));
                        assert_eq!(hit.valid, expected.is_some(), "{backend} n={n} i={i}");
                        if let Some(raw) = expected {
                            assert_eq!(hit.w, raw.t);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let scene = scene();
        let flag = AtomicBool::new(true);
        let rays = rays(20);
        let out = dispatch(
            &scene,
            &rays,
            Kernel::Tree,
            &DispatchOptions {
                parallel: true,
                cancel: Some(&flag),
            },
        );
        assert!(out.cancelled);
        assert_eq!(out.hits.len(), 20);
        assert!(out.hits.iter().all(|h| !h.valid));
    }

    #[test]
    fn test_batch_result_soa() {
        let scene = scene();
        let rays = rays(6);
        let out = dispatch(&scene, &rays, Kernel::Tree, &DispatchOptions::default());
        let batch = BatchResult::from(out);
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.points.len(), 6);
        assert_eq!(batch.face_ids.len(), 6);
        for i in 0..6 {
            if batch.hits[i] {
                assert_eq!(batch.face_ids[i], 0);
            } else {
                assert_eq!(batch.face_ids[i], -1);
                assert_eq!(batch.ws[i], 0.0);
            }
        }
        // Rays 0 and 4 aim at the sphere, 1 and 3 pass beside it, 2 and 5 are inert.
        assert_eq!(batch.hit_count(), 2);
    }
}
