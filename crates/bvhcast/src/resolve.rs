//! Turn raw triangle hits into face-level results.

use bvhcast_math::{Point2, Point3, Vec3};

use crate::ray::Ray;
use crate::scene::{Face, LoadedScene};
use crate::traverse::RawHit;

/// Result of one ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// True if the ray hit the shape inside its window.
    pub valid: bool,
    /// Hit point in world space.
    pub point: Point3,
    /// Ray parameter of the hit (distance along the unit direction).
    pub w: f64,
    /// Unit normal at the hit, pointing out of the material.
    pub normal: Vec3,
    /// Surface parameters of the hit on its face.
    pub uv: Point2,
    /// Id of the face that was hit.
    pub face_id: usize,
    /// Id of the triangle that was hit.
    pub triangle_id: usize,
}

impl HitResult {
    /// The result of a ray that hit nothing: invalid, all fields zeroed.
    pub fn miss() -> Self {
        Self {
            valid: false,
            point: Point3::origin(),
            w: 0.0,
            normal: Vec3::zeros(),
            uv: Point2::origin(),
            face_id: 0,
            triangle_id: 0,
        }
    }

    /// True on a hit.
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.valid
    }
}

impl Default for HitResult {
    fn default() -> Self {
        Self::miss()
    }
}

/// Resolve a raw hit against the scene it came from.
pub fn resolve(scene: &LoadedScene, ray: &Ray, raw: &RawHit) -> HitResult {
    let triangle = &scene.triangles()[raw.triangle as usize];
    let (u, v) = (raw.u, raw.v);
    let w0 = 1.0 - u - v;

    let uv = Point2::from(triangle.uvs[0].coords * w0 + triangle.uvs[1].coords * u + triangle.uvs[2].coords * v);
    let face = scene.face(triangle.face as usize);
    let uv = match face {
        Some(face) => clamp_uv(uv, face, scene.tolerance()),
        None => uv,
    };

    let normal = triangle
        .vertex_normals
        .and_then(|[n0, n1, n2]| (n0 * w0 + n1 * u + n2 * v).try_normalize(1e-12))
        .unwrap_or(triangle.normal);

    HitResult {
        valid: true,
        point: ray.at(raw.t),
        w: raw.t,
        normal,
        uv,
        face_id: triangle.face as usize,
        triangle_id: raw.triangle as usize,
    }
}

/// Keep interpolated UVs inside the face's parameter bounds (widened by
/// `tolerance`) and inside the surface domain in non-periodic directions.
fn clamp_uv(uv: Point2, face: &Face, tolerance: f64) -> Point2 {
    let (mut u, mut v) = (uv.x, uv.y);
    if let Some(bounds) = &face.uv_bounds {
        u = clamp_to(u, bounds.min.x - tolerance, bounds.max.x + tolerance);
        v = clamp_to(v, bounds.min.y - tolerance, bounds.max.y + tolerance);
    }
    if let Some(surface) = &face.surface {
        let ((u_min, u_max), (v_min, v_max)) = surface.domain();
        if !surface.is_periodic_u() {
            u = clamp_to(u, u_min, u_max);
        }
        if !surface.is_periodic_v() {
            v = clamp_to(v, v_min, v_max);
        }
    }
    Point2::new(u, v)
}

/// Clamp that leaves `x` alone on an empty or NaN range.
#[inline]
fn clamp_to(x: f64, lo: f64, hi: f64) -> f64 {
    if lo <= hi {
        x.max(lo).min(hi)
    } else {
        x
    }
}
