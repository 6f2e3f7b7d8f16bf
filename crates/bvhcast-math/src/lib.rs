#![warn(missing_docs)]

//! Math types for the bvhcast ray casting engine.
//!
//! Thin aliases over nalgebra for points, vectors and directions, plus the
//! small amount of geometry every other crate needs: affine placement of
//! face meshes, tolerance constants and axis-aligned bounding boxes.

mod aabb;

pub use aabb::Aabb3;

use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// Component of a point along axis `0`, `1` or `2`.
#[inline]
pub fn axis_value(p: &Point3, axis: usize) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

/// A 4x4 affine transformation, used to place face meshes in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// True if this is exactly the identity.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a normal vector by the inverse transpose of the linear part.
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        match m3.try_inverse() {
            Some(inv) => inv.transpose() * n,
            None => *n,
        }
    }

    /// True if the linear part flips handedness (negative determinant).
    ///
    /// Mirrored placements reverse triangle winding.
    pub fn is_mirroring(&self) -> bool {
        self.matrix.fixed_view::<3, 3>(0, 0).determinant() < 0.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Geometric tolerance shared by mesh loading and shape construction.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance below which lengths count as zero.
    pub linear: f64,
}

impl Tolerance {
    /// 1e-9 model units.
    pub const DEFAULT: Self = Self { linear: 1e-9 };
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
