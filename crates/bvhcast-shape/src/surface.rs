//! Analytic surfaces carried by shape faces.
//!
//! The engine never intersects these directly; they give each face a
//! parameter domain (used to validate UV results) and let callers evaluate
//! the exact geometry behind a hit.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt::Debug;

use bvhcast_math::{Dir3, Point2, Point3, Vec3};

/// The kind of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface (infinite extent along the axis).
    Cylinder,
    /// Spherical surface.
    Sphere,
}

/// A parametric surface in 3D space.
pub trait Surface: Send + Sync + Debug {
    /// Evaluate the surface at parameter `(u, v)`.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Unit surface normal at parameter `(u, v)`.
    fn normal(&self, uv: Point2) -> Dir3;

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    fn domain(&self) -> ((f64, f64), (f64, f64));

    /// True if the surface closes on itself in `u`.
    fn is_periodic_u(&self) -> bool {
        false
    }

    /// True if the surface closes on itself in `v`.
    fn is_periodic_v(&self) -> bool {
        false
    }

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;
}

/// An infinite plane: `P(u, v) = origin + u * x_dir + v * y_dir`.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along u.
    pub x_dir: Dir3,
    /// Unit vector along v.
    pub y_dir: Dir3,
    /// Unit normal, `x_dir × y_dir`.
    pub normal_dir: Dir3,
}

impl Plane {
    /// Plane through `origin` spanned by `x_dir` and `y_dir`.
    ///
    /// `y_dir` is re-orthogonalized against `x_dir`.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let y = Dir3::new_normalize(y_dir - y_dir.dot(x.as_ref()) * x.as_ref());
        let n = Dir3::new_normalize(x.as_ref().cross(y.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (f64::NEG_INFINITY, f64::INFINITY),
            (f64::NEG_INFINITY, f64::INFINITY),
        )
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }
}

/// A cylinder around an axis.
///
/// `P(u, v) = center + radius * (cos(u) * ref_dir + sin(u) * y_dir) + v * axis`
/// with `u ∈ [0, 2π)` and `v` the height along the axis.
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Point on the axis at `v = 0`.
    pub center: Point3,
    /// Unit axis direction.
    pub axis: Dir3,
    /// Reference direction for `u = 0`, perpendicular to the axis.
    pub ref_dir: Dir3,
    /// Radius.
    pub radius: f64,
}

impl CylinderSurface {
    /// Cylinder with axis `+Z` through the origin.
    pub fn new(radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.center
            + self.radius * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
            + uv.y * self.axis.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        Dir3::new_normalize(cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (f64::NEG_INFINITY, f64::INFINITY))
    }

    fn is_periodic_u(&self) -> bool {
        true
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }
}

/// A sphere.
///
/// `P(u, v) = center + radius * (cos(v) * (cos(u) * ref_dir + sin(u) * y_dir) + sin(v) * axis)`
/// with longitude `u ∈ [0, 2π)` and latitude `v ∈ [-π/2, π/2]`.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Center of the sphere.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for `u = 0`.
    pub ref_dir: Dir3,
    /// Axis direction (north pole).
    pub axis: Dir3,
}

impl SphereSurface {
    /// Sphere centered at the origin, north pole on `+Z`.
    pub fn new(radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            radius,
            ref_dir: Dir3::new_normalize(Vec3::x()),
            axis: Dir3::new_normalize(Vec3::z()),
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    /// Unit radial direction at `(u, v)`.
    ///
    /// The poles are returned exactly on the axis so that every vertex
    /// sampled there coincides.
    fn radial(&self, uv: Point2) -> Vec3 {
        if (uv.y.abs() - FRAC_PI_2).abs() < 1e-12 {
            return uv.y.signum() * self.axis.as_ref();
        }
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        cos_v * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir()) + sin_v * self.axis.as_ref()
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.center + self.radius * self.radial(uv)
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        Dir3::new_normalize(self.radial(uv))
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-FRAC_PI_2, FRAC_PI_2))
    }

    fn is_periodic_u(&self) -> bool {
        true
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_frame() {
        let plane = Plane::new(
            Point3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let uv = Point2::new(0.5, -2.0);
        assert_relative_eq!(plane.evaluate(uv), Point3::new(1.0, 2.5, 1.0), epsilon = 1e-12);
        assert_relative_eq!(*plane.normal(uv).as_ref(), Vec3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_cylinder_point_is_on_radius() {
        let cyl = CylinderSurface::new(3.0);
        let p = cyl.evaluate(Point2::new(1.2, 5.0));
        assert_relative_eq!((p.x * p.x + p.y * p.y).sqrt(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 5.0);
        assert!(cyl.is_periodic_u());
        assert!(!cyl.is_periodic_v());
    }

    #[test]
    fn test_sphere_poles_are_exact() {
        let s = SphereSurface::new(50.0);
        for i in 0..8 {
            let u = i as f64 * 0.7;
            assert_eq!(s.evaluate(Point2::new(u, FRAC_PI_2)), Point3::new(0.0, 0.0, 50.0));
            assert_eq!(s.evaluate(Point2::new(u, -FRAC_PI_2)), Point3::new(0.0, 0.0, -50.0));
        }
    }

    #[test]
    fn test_sphere_normal_is_radial() {
        let s = SphereSurface::new(2.0);
        let uv = Point2::new(0.3, 0.4);
        let p = s.evaluate(uv);
        let n = s.normal(uv);
        assert_relative_eq!(p.coords / 2.0, *n.as_ref(), epsilon = 1e-12);
    }
}
