#![warn(missing_docs)]

//! Tessellated B-rep shape input for the bvhcast engine.
//!
//! A shape is a list of faces. Each face carries (once tessellated) a
//! triangle mesh with per-node UV parameters on the face's surface, optional
//! per-node normals, and a location placing the mesh in world space.
//!
//! - [`TessellatedShape`] - the interface the engine loads from
//! - [`MeshShape`] - pre-tessellated faces with no tessellator behind them
//! - [`ParametricShape`] - box, sphere and cylinder primitives that
//!   tessellate on demand at a requested deflection
//!
//! # Example
//!
//! ```
//! use bvhcast_shape::{make_sphere, TessellatedShape};
//!
//! let mut sphere = make_sphere(50.0).unwrap();
//! sphere.tessellate(0.1).unwrap();
//! assert_eq!(sphere.num_faces(), 1);
//! assert!(sphere.face_mesh(0).is_some());
//! ```

mod error;
mod primitives;
pub mod surface;

pub use error::{Result, ShapeError};
pub use primitives::{
    make_box, make_cylinder, make_sphere, segments_for_deflection, ParametricShape,
};
pub use surface::{CylinderSurface, Plane, SphereSurface, Surface, SurfaceKind};

use std::sync::Arc;

use bvhcast_math::{Point2, Point3, Transform, Vec3};

/// Triangulation of a single face.
#[derive(Debug, Clone, Default)]
pub struct FaceMesh {
    /// Node positions in the face's local frame.
    pub nodes: Vec<Point3>,
    /// UV parameters of each node on the face's surface.
    pub uv_nodes: Vec<Point2>,
    /// Optional per-node normals, oriented with the surface (not the face).
    pub normals: Option<Vec<Vec3>>,
    /// Triangles as node index triples, counter-clockwise seen from the
    /// side the surface normal points to.
    pub triangles: Vec<[u32; 3]>,
    /// Placement of the local frame in world space.
    pub location: Transform,
}

impl FaceMesh {
    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// True if the UV and normal arrays match the node count.
    pub fn is_consistent(&self) -> bool {
        self.uv_nodes.len() == self.nodes.len()
            && self
                .normals
                .as_ref()
                .map_or(true, |n| n.len() == self.nodes.len())
    }
}

/// A B-rep shape whose faces can be read as triangle meshes.
pub trait TessellatedShape {
    /// Number of faces. Face indices are `0..num_faces()`.
    fn num_faces(&self) -> usize;

    /// Current triangulation of a face, if it has one.
    fn face_mesh(&self, index: usize) -> Option<&FaceMesh>;

    /// Surface underlying a face, if known.
    fn face_surface(&self, index: usize) -> Option<Arc<dyn Surface>>;

    /// True if the face is reversed relative to its surface, i.e. the
    /// outward normal is the opposite of the surface normal.
    fn face_reversed(&self, _index: usize) -> bool {
        false
    }

    /// Deflection of the current tessellation, or `None` if the shape has
    /// not been tessellated by a known tessellator.
    fn deflection(&self) -> Option<f64>;

    /// (Re)tessellate every face at `deflection`.
    fn tessellate(&mut self, _deflection: f64) -> Result<()> {
        Err(ShapeError::TessellationUnavailable)
    }
}

/// A shape assembled from existing face meshes.
///
/// It has no tessellator: [`TessellatedShape::tessellate`] always fails
/// with [`ShapeError::TessellationUnavailable`].
#[derive(Debug, Clone, Default)]
pub struct MeshShape {
    faces: Vec<MeshFace>,
}

#[derive(Debug, Clone)]
struct MeshFace {
    mesh: Option<FaceMesh>,
    surface: Option<Arc<dyn Surface>>,
    reversed: bool,
}

impl MeshShape {
    /// Create an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a face with a mesh; returns its index.
    pub fn add_face(&mut self, mesh: FaceMesh) -> usize {
        self.push(Some(mesh), None, false)
    }

    /// Append a face with a mesh, surface and orientation; returns its index.
    pub fn add_face_with_surface(
        &mut self,
        mesh: FaceMesh,
        surface: Arc<dyn Surface>,
        reversed: bool,
    ) -> usize {
        self.push(Some(mesh), Some(surface), reversed)
    }

    /// Append a face that has not been triangulated; returns its index.
    pub fn add_untessellated_face(&mut self, surface: Option<Arc<dyn Surface>>) -> usize {
        self.push(None, surface, false)
    }

    fn push(
        &mut self,
        mesh: Option<FaceMesh>,
        surface: Option<Arc<dyn Surface>>,
        reversed: bool,
    ) -> usize {
        self.faces.push(MeshFace {
            mesh,
            surface,
            reversed,
        });
        self.faces.len() - 1
    }
}

impl TessellatedShape for MeshShape {
    fn num_faces(&self) -> usize {
        self.faces.len()
    }

    fn face_mesh(&self, index: usize) -> Option<&FaceMesh> {
        self.faces.get(index).and_then(|f| f.mesh.as_ref())
    }

    fn face_surface(&self, index: usize) -> Option<Arc<dyn Surface>> {
        self.faces.get(index).and_then(|f| f.surface.clone())
    }

    fn face_reversed(&self, index: usize) -> bool {
        self.faces.get(index).is_some_and(|f| f.reversed)
    }

    fn deflection(&self) -> Option<f64> {
        None
    }
}
