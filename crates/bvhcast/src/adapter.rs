//! Conversion of a tessellated shape into a flat triangle soup.
//!
//! Each triangle keeps its world-space vertices, UVs, optional smooth
//! normals and the index of the face it came from. No BVH work happens
//! here; see [`crate::scene::LoadedScene::build`].

use bvhcast_math::{Point2, Point3, Tolerance, Transform, Vec3};
use bvhcast_shape::{FaceMesh, ShapeError, TessellatedShape};

use crate::error::{RaytraceError, Result};
use crate::scene::{Face, UvBounds};
use crate::triangle::Triangle;

/// Faces and triangles read from a shape, ready for BVH construction.
#[derive(Debug, Clone, Default)]
pub struct TriangleSoup {
    /// One entry per shape face, indexed by face id.
    pub faces: Vec<Face>,
    /// Triangles, grouped by face in face order.
    pub triangles: Vec<Triangle>,
    /// Triangles dropped as degenerate or malformed.
    pub dropped: usize,
}

/// Check the load parameters.
pub fn validate_parameters(tolerance: f64, deflection: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(RaytraceError::InvalidConfig(format!(
            "tolerance must be finite and >= 0, got {tolerance}"
        )));
    }
    if !deflection.is_finite() || deflection <= 0.0 {
        return Err(RaytraceError::InvalidConfig(format!(
            "deflection must be finite and > 0, got {deflection}"
        )));
    }
    Ok(())
}

/// Make sure the shape is tessellated at least as finely as `deflection`.
fn ensure_tessellation(shape: &mut dyn TessellatedShape, deflection: f64) -> Result<()> {
    let up_to_date = shape.deflection().is_some_and(|d| d <= deflection);
    if up_to_date {
        return Ok(());
    }
    match shape.tessellate(deflection) {
        Ok(()) => Ok(()),
        Err(ShapeError::TessellationUnavailable) => {
            let has_mesh = (0..shape.num_faces()).any(|i| shape.face_mesh(i).is_some());
            if has_mesh {
                log::warn!(
                    "shape cannot be re-tessellated at deflection {deflection}; using its existing meshes"
                );
                Ok(())
            } else {
                Err(RaytraceError::UntessellatedShape(
                    "shape has no meshes and no tessellator".into(),
                ))
            }
        }
        Err(e) => Err(RaytraceError::UntessellatedShape(e.to_string())),
    }
}

/// Tessellate the shape if needed and flatten it into a triangle soup.
pub fn adapt(
    shape: &mut dyn TessellatedShape,
    tolerance: f64,
    deflection: f64,
) -> Result<TriangleSoup> {
    validate_parameters(tolerance, deflection)?;
    ensure_tessellation(shape, deflection)?;

    let mut soup = TriangleSoup::default();
    for index in 0..shape.num_faces() {
        let start = soup.triangles.len();
        let reversed = shape.face_reversed(index);
        let mut uv_bounds = None;
        if let Some(mesh) = shape.face_mesh(index) {
            soup.dropped += push_face_triangles(mesh, index as u32, reversed, &mut soup.triangles);
            uv_bounds = UvBounds::from_points(&mesh.uv_nodes);
        }
        soup.faces.push(Face {
            id: index,
            surface: shape.face_surface(index),
            triangles: start..soup.triangles.len(),
            uv_bounds,
            reversed,
        });
    }

    if soup.triangles.is_empty() {
        return Err(RaytraceError::UntessellatedShape(format!(
            "{} faces produced no usable triangles",
            soup.faces.len()
        )));
    }
    if soup.dropped > 0 {
        log::debug!("dropped {} degenerate or malformed triangles", soup.dropped);
    }
    Ok(soup)
}

/// Append the triangles of one face mesh; returns how many were dropped.
fn push_face_triangles(
    mesh: &FaceMesh,
    face: u32,
    reversed: bool,
    out: &mut Vec<Triangle>,
) -> usize {
    if !mesh.is_consistent() {
        log::warn!(
            "face {face}: {} nodes but {} uv nodes; missing data is zero-filled",
            mesh.nodes.len(),
            mesh.uv_nodes.len()
        );
    }

    let location: &Transform = &mesh.location;
    let placed = !location.is_identity();
    let flip = reversed ^ location.is_mirroring();
    let min_area = Tolerance::DEFAULT.linear * Tolerance::DEFAULT.linear;

    let position = |i: usize| -> Point3 {
        let p = mesh.nodes[i];
        if placed {
            location.apply_point(&p)
        } else {
            p
        }
    };
    let uv = |i: usize| -> Point2 { mesh.uv_nodes.get(i).copied().unwrap_or_else(Point2::origin) };
    let normal = |i: usize| -> Option<Vec3> {
        let n = *mesh.normals.as_ref()?.get(i)?;
        let n = if placed { location.apply_normal(&n) } else { n };
        let n = n.try_normalize(0.0)?;
        Some(if reversed { -n } else { n })
    };

    let mut dropped = 0;
    for tri in &mesh.triangles {
        let [a, b, c] = tri.map(|i| i as usize);
        if a.max(b).max(c) >= mesh.nodes.len() {
            dropped += 1;
            continue;
        }
        let idx = if flip { [a, c, b] } else { [a, b, c] };

        let vertex_normals = match (normal(idx[0]), normal(idx[1]), normal(idx[2])) {
            (Some(n0), Some(n1), Some(n2)) => Some([n0, n1, n2]),
            _ => None,
        };
        let triangle = Triangle::new(
            idx.map(position),
            idx.map(uv),
            vertex_normals,
            face,
        );
        if !(triangle.area() > min_area) {
            dropped += 1;
            continue;
        }
        out.push(triangle);
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bvhcast_shape::{make_box, make_sphere, MeshShape};

    fn quad(z: f64) -> FaceMesh {
        FaceMesh {
            nodes: vec![
                Point3::new(0.0, 0.0, z),
                Point3::new(1.0, 0.0, z),
                Point3::new(1.0, 1.0, z),
                Point3::new(0.0, 1.0, z),
            ],
            uv_nodes: vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            normals: None,
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            location: Transform::identity(),
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut shape = make_box(1.0, 1.0, 1.0).unwrap();
        assert!(matches!(adapt(&mut shape, -1.0, 0.1), Err(RaytraceError::InvalidConfig(_))));
        assert!(matches!(adapt(&mut shape, 0.0, 0.0), Err(RaytraceError::InvalidConfig(_))));
        assert!(matches!(adapt(&mut shape, 0.0, f64::NAN), Err(RaytraceError::InvalidConfig(_))));
    }

    #[test]
    fn test_tessellates_on_demand() {
        let mut shape = make_box(10.0, 20.0, 30.0).unwrap();
        assert!(shape.deflection().is_none());
        let soup = adapt(&mut shape, 0.001, 0.1).unwrap();
        assert_eq!(shape.deflection(), Some(0.1));
        assert_eq!(soup.faces.len(), 6);
        assert_eq!(soup.triangles.len(), 12);
        for (id, face) in soup.faces.iter().enumerate() {
            assert_eq!(face.id, id);
            assert_eq!(face.triangles.len(), 2);
            for t in &soup.triangles[face.triangles.clone()] {
                assert_eq!(t.face as usize, id);
            }
        }
    }

    #[test]
    fn test_retessellates_only_when_coarser() {
        let mut shape = make_sphere(5.0).unwrap();
        adapt(&mut shape, 0.0, 0.01).unwrap();
        adapt(&mut shape, 0.0, 0.1).unwrap();
        assert_eq!(shape.deflection(), Some(0.01));
        adapt(&mut shape, 0.0, 0.001).unwrap();
        assert_eq!(shape.deflection(), Some(0.001));
    }

    #[test]
    fn test_sphere_pole_triangles_are_dropped() {
        let mut shape = make_sphere(50.0).unwrap();
        let soup = adapt(&mut shape, 0.001, 0.1).unwrap();
        // One degenerate triangle per longitude segment at each pole.
        assert_eq!(soup.dropped, 100);
        assert_eq!(soup.triangles.len(), 2500 - 100);
        assert!(soup.triangles.iter().all(|t| t.vertex_normals.is_some()));
    }

    #[test]
    fn test_untessellated_shape_fails() {
        let mut shape = MeshShape::new();
        shape.add_untessellated_face(None);
        assert!(matches!(
            adapt(&mut shape, 0.0, 0.1),
            Err(RaytraceError::UntessellatedShape(_))
        ));
        let mut empty = MeshShape::new();
        assert!(matches!(
            adapt(&mut empty, 0.0, 0.1),
            Err(RaytraceError::UntessellatedShape(_))
        ));
    }

    #[test]
    fn test_premeshed_shape_is_used_as_is() {
        let mut shape = MeshShape::new();
        shape.add_untessellated_face(None);
        shape.add_face(quad(0.0));
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        assert_eq!(soup.faces.len(), 2);
        assert!(soup.faces[0].triangles.is_empty());
        assert_eq!(soup.faces[1].triangles, 0..2);
        assert!(soup.triangles.iter().all(|t| t.face == 1));
    }

    #[test]
    fn test_degenerate_and_malformed_triangles_are_dropped() {
        let mut mesh = quad(0.0);
        mesh.triangles.push([0, 0, 1]);
        mesh.triangles.push([0, 1, 9]);
        let mut shape = MeshShape::new();
        shape.add_face(mesh);
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        assert_eq!(soup.triangles.len(), 2);
        assert_eq!(soup.dropped, 2);
    }

    #[test]
    fn test_reversed_face_flips_normals() {
        let mut mesh = quad(0.0);
        mesh.normals = Some(vec![Vec3::z(); 4]);
        let mut shape = MeshShape::new();
        shape.add_face_with_surface(
            mesh,
            std::sync::Arc::new(bvhcast_shape::Plane::new(Point3::origin(), Vec3::x(), Vec3::y())),
            true,
        );
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        for t in &soup.triangles {
            assert_relative_eq!(t.normal, -Vec3::z());
            for n in t.vertex_normals.unwrap() {
                assert_relative_eq!(n, -Vec3::z());
            }
        }
        assert!(soup.faces[0].reversed);
    }

    #[test]
    fn test_location_is_applied() {
        let mut mesh = quad(0.0);
        mesh.location = Transform::translation(0.0, 0.0, 7.0);
        let mut shape = MeshShape::new();
        shape.add_face(mesh);
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        assert!(soup.triangles.iter().all(|t| t.vertices.iter().all(|v| v.z == 7.0)));
    }

    #[test]
    fn test_mirrored_location_keeps_outward_normal() {
        let mut mesh = quad(1.0);
        mesh.location = Transform::scale(1.0, 1.0, -1.0);
        let mut shape = MeshShape::new();
        shape.add_face(mesh);
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        // The +Z facing quad at z = 1 becomes a -Z facing quad at z = -1.
        for t in &soup.triangles {
            assert_relative_eq!(t.normal, -Vec3::z());
            assert_relative_eq!(t.vertices[0].z, -1.0);
        }
    }

    #[test]
    fn test_face_uv_bounds() {
        let mut shape = MeshShape::new();
        shape.add_face(quad(0.0));
        let soup = adapt(&mut shape, 0.0, 0.1).unwrap();
        let b = soup.faces[0].uv_bounds.unwrap();
        assert_eq!(b.min, Point2::new(0.0, 0.0));
        assert_eq!(b.max, Point2::new(1.0, 1.0));
    }
}
