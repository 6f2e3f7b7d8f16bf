//! Ray representation and the ray-box slab test.

use bvhcast_math::{Aabb3, Dir3, Point3, Vec3};

use crate::error::{RaytraceError, Result};

/// A ray in 3D space with a clamp window on its parameter.
///
/// Hits are only reported for `min_dist <= t <= max_dist`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Lower end of the clamp window (never negative).
    pub min_dist: f64,
    /// Upper end of the clamp window.
    pub max_dist: f64,
    /// Precomputed reciprocal of direction components for box tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a ray with the full window `[0, f64::MAX]`.
    ///
    /// The direction is normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Result<Self> {
        Self::with_window(origin, direction, 0.0, f64::MAX)
    }

    /// Create a ray restricted to `[min_dist, max_dist]`.
    ///
    /// Fails on a non-finite origin, a zero-length or non-finite direction,
    /// a NaN bound, or `min_dist > max_dist`. A negative `min_dist` is then
    /// raised to zero, so a window lying wholly behind the origin is empty
    /// and the ray hits nothing.
    pub fn with_window(origin: Point3, direction: Vec3, min_dist: f64, max_dist: f64) -> Result<Self> {
        if !origin.coords.iter().all(|c| c.is_finite()) {
            return Err(RaytraceError::InvalidRay(format!(
                "origin {:?} is not finite",
                origin.coords.as_slice()
            )));
        }
        let norm = direction.norm();
        if !norm.is_finite() || norm == 0.0 {
            return Err(RaytraceError::InvalidRay(format!(
                "direction {:?} has no usable length",
                direction.as_slice()
            )));
        }
        if min_dist.is_nan() || max_dist.is_nan() {
            return Err(RaytraceError::InvalidRay("NaN distance bound".into()));
        }
        if min_dist > max_dist {
            return Err(RaytraceError::InvalidRay(format!(
                "min_dist {min_dist} exceeds max_dist {max_dist}"
            )));
        }
        let min_dist = min_dist.max(0.0);

        let dir = Dir3::new_unchecked(direction / norm);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Ok(Self {
            origin,
            direction: dir,
            min_dist,
            max_dist,
            inv_direction: inv,
            sign,
        })
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// True if `t` lies inside the clamp window.
    #[inline]
    pub fn in_window(&self, t: f64) -> bool {
        t >= self.min_dist && t <= self.max_dist
    }

    /// Reciprocal direction, used by packet traversal.
    #[cfg(feature = "simd")]
    #[inline]
    pub(crate) fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    /// Ray-box test using the slab method, clipped to the clamp window.
    ///
    /// Returns the entry and exit parameters if the ray overlaps the box
    /// inside its window. A ray parallel to a slab and outside it misses.
    /// A ray lying exactly on a slab boundary produces `0 * inf = NaN` for
    /// that bound; `f64::max`/`f64::min` discard NaN, so boundaries count
    /// as inside.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1.max(self.min_dist);
        let mut t_max = tx2.min(self.max_dist);

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min {
            Some((t_min, t_max))
        } else {
            None
        }
    }
}
