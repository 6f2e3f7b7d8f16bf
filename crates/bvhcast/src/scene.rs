//! The loaded scene: faces, triangles and the acceleration structures
//! built over them.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bvhcast_math::Point2;
use bvhcast_shape::{Surface, TessellatedShape};

use crate::adapter::{self, TriangleSoup};
use crate::bvh::Bvh;
#[cfg(feature = "accel")]
use crate::bvh::FlatBvh;
use crate::error::Result;
use crate::triangle::Triangle;

/// Axis-aligned bounds of a face's UV parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvBounds {
    /// Smallest `(u, v)`.
    pub min: Point2,
    /// Largest `(u, v)`.
    pub max: Point2,
}

impl UvBounds {
    /// Bounds of a set of UV points, `None` if empty.
    pub fn from_points(points: &[Point2]) -> Option<Self> {
        let first = *points.first()?;
        Some(points.iter().fold(
            Self {
                min: first,
                max: first,
            },
            |b, p| Self {
                min: Point2::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                max: Point2::new(b.max.x.max(p.x), b.max.y.max(p.y)),
            },
        ))
    }
}

/// A face of the loaded shape.
#[derive(Clone)]
pub struct Face {
    /// Stable 0-based id: the face's index in the input shape.
    pub id: usize,
    /// Surface the face lies on, if the shape exposed it.
    pub surface: Option<Arc<dyn Surface>>,
    /// Contiguous range of this face's triangles in the scene.
    pub triangles: Range<usize>,
    /// UV bounds of the face mesh nodes.
    pub uv_bounds: Option<UvBounds>,
    /// True if the face is reversed relative to its surface.
    pub reversed: bool,
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("id", &self.id)
            .field("surface", &self.surface.as_ref().map(|s| s.surface_type()))
            .field("triangles", &self.triangles)
            .field("uv_bounds", &self.uv_bounds)
            .field("reversed", &self.reversed)
            .finish()
    }
}

/// Everything needed to answer ray queries against one shape.
///
/// Immutable after [`LoadedScene::build`]; shared read-only between
/// worker threads.
#[derive(Debug)]
pub struct LoadedScene {
    faces: Vec<Face>,
    triangles: Vec<Triangle>,
    bvh: Bvh,
    #[cfg(feature = "accel")]
    flat: FlatBvh,
    tolerance: f64,
    deflection: f64,
}

impl LoadedScene {
    /// Build the BVH (and its flattened form) over a triangle soup.
    ///
    /// Blocks until construction is complete.
    pub fn build(soup: TriangleSoup, tolerance: f64, deflection: f64) -> Self {
        let TriangleSoup {
            faces, triangles, ..
        } = soup;
        let bvh = Bvh::build(&triangles);
        let stats = bvh.stats();
        log::debug!(
            "built BVH over {} triangles: {} nodes, {} leaves, depth {}",
            triangles.len(),
            stats.nodes,
            stats.leaves,
            stats.depth
        );
        #[cfg(feature = "accel")]
        let flat = bvh.flatten();
        Self {
            faces,
            triangles,
            bvh,
            #[cfg(feature = "accel")]
            flat,
            tolerance,
            deflection,
        }
    }

    /// All faces, indexed by face id.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// A face by id.
    pub fn face(&self, id: usize) -> Option<&Face> {
        self.faces.get(id)
    }

    /// All triangles, indexed by triangle id.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// The bounding volume hierarchy.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// The flattened hierarchy used by the accelerated and packet kernels.
    #[cfg(feature = "accel")]
    pub fn flat_bvh(&self) -> &FlatBvh {
        &self.flat
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Tolerance used for UV validation.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Deflection the shape was tessellated at.
    pub fn deflection(&self) -> f64 {
        self.deflection
    }
}

/// Adapt a shape and build its scene: tessellate if needed, flatten into
/// triangles, build the BVH.
pub fn load(
    shape: &mut dyn TessellatedShape,
    tolerance: f64,
    deflection: f64,
) -> Result<LoadedScene> {
    let soup = adapter::adapt(shape, tolerance, deflection)?;
    Ok(LoadedScene::build(soup, tolerance, deflection))
}
