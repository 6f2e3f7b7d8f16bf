//! Triangles of the loaded triangle soup.

use bvhcast_math::{Aabb3, Point2, Point3, Vec3};

use crate::ray::Ray;

/// Rounding allowance on the barycentric bounds of the triangle test.
pub const BARYCENTRIC_SLACK: f64 = 1e-12;

/// A triangle tagged with the face it came from.
///
/// Immutable once the scene is built. `face` is an index into the scene's
/// face table, not an owning reference.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertex positions in world space.
    pub vertices: [Point3; 3],
    /// Unit flat normal, pointing out of the material.
    pub normal: Vec3,
    /// Per-vertex normals for smooth shading, oriented like `normal`.
    pub vertex_normals: Option<[Vec3; 3]>,
    /// Per-vertex UV parameters on the face's surface.
    pub uvs: [Point2; 3],
    /// Index of the originating face.
    pub face: u32,
    edge1: Vec3,
    edge2: Vec3,
    double_area: f64,
}

impl Triangle {
    /// Build a triangle. The flat normal follows the winding `v0 → v1 → v2`.
    pub fn new(
        vertices: [Point3; 3],
        uvs: [Point2; 3],
        vertex_normals: Option<[Vec3; 3]>,
        face: u32,
    ) -> Self {
        let edge1 = vertices[1] - vertices[0];
        let edge2 = vertices[2] - vertices[0];
        let cross = edge1.cross(&edge2);
        let double_area = cross.norm();
        let normal = if double_area > 0.0 {
            cross / double_area
        } else {
            Vec3::zeros()
        };
        Self {
            vertices,
            normal,
            vertex_normals,
            uvs,
            face,
            edge1,
            edge2,
            double_area,
        }
    }

    /// Triangle area.
    pub fn area(&self) -> f64 {
        0.5 * self.double_area
    }

    /// Tight bounding box.
    pub fn aabb(&self) -> Aabb3 {
        Aabb3::from_points(self.vertices.iter())
    }

    /// Centroid of the three vertices.
    pub fn centroid(&self) -> Point3 {
        Point3::from((self.vertices[0].coords + self.vertices[1].coords + self.vertices[2].coords) / 3.0)
    }

    /// Möller–Trumbore intersection.
    ///
    /// Returns `(t, u, v)` where `u` and `v` are the barycentric weights of
    /// `v1` and `v2`. A hit requires `u >= 0`, `v >= 0`, `u + v <= 1` (edges
    /// included) and `t` inside the ray's window. Both sides are hit.
    ///
    /// The edge bounds carry [`BARYCENTRIC_SLACK`] so that a ray through a
    /// shared edge or vertex is not lost to rounding in every adjacent
    /// triangle; the returned weights are clamped back into the triangle.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<(f64, f64, f64)> {
        let d = ray.direction.as_ref();
        let h = d.cross(&self.edge2);
        let det = self.edge1.dot(&h);
        // Parallel to the plane: |d · n| below 1e-12.
        if det.abs() <= 1e-12 * self.double_area {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = ray.origin - self.vertices[0];
        let u = inv_det * s.dot(&h);
        if u < -BARYCENTRIC_SLACK || u > 1.0 + BARYCENTRIC_SLACK {
            return None;
        }
        let q = s.cross(&self.edge1);
        let v = inv_det * d.dot(&q);
        if v < -BARYCENTRIC_SLACK || u + v > 1.0 + BARYCENTRIC_SLACK {
            return None;
        }
        let t = inv_det * self.edge2.dot(&q);
        if !ray.in_window(t) {
            return None;
        }
        let (u, v) = (u.max(0.0), v.max(0.0));
        let sum = u + v;
        if sum > 1.0 {
            Some((t, u / sum, v / sum))
        } else {
            Some((t, u, v))
        }
    }
}
