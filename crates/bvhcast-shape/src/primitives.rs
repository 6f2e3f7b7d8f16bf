//! Parametric primitive shapes: box, sphere and cylinder.
//!
//! Faces are described by a surface and a parameter region; meshes are
//! produced on demand by [`TessellatedShape::tessellate`] with segment
//! counts chosen so the chordal deviation stays under the deflection.

use std::f64::consts::PI;
use std::sync::Arc;

use bvhcast_math::{Point2, Point3, Transform, Vec3};

use crate::surface::{CylinderSurface, Plane, SphereSurface, Surface};
use crate::{FaceMesh, Result, ShapeError, TessellatedShape};

/// Upper bound on segments along one parameter direction.
const MAX_SEGMENTS: usize = 4096;

/// Number of segments needed to approximate an arc of `span` radians on a
/// circle of `radius` with chordal deviation at most `deflection`.
///
/// Never fewer than 3 segments per full turn.
pub fn segments_for_deflection(radius: f64, deflection: f64, span: f64) -> usize {
    let ratio = (1.0 - deflection / radius).clamp(-1.0, 1.0);
    let step = 2.0 * ratio.acos();
    let min = (3.0 * span / (2.0 * PI)).ceil().max(1.0);
    let n = if step > 0.0 {
        (span / step).ceil()
    } else {
        MAX_SEGMENTS as f64
    };
    (n.max(min) as usize).min(MAX_SEGMENTS)
}

/// Parameter region of a primitive face.
#[derive(Debug, Clone, Copy)]
enum Region {
    /// Rectangle in `(u, v)` with a fixed number of segments per direction.
    Rect {
        u: (f64, f64),
        v: (f64, f64),
        /// Radius driving the segment count along each direction, if curved.
        u_radius: Option<f64>,
        v_radius: Option<f64>,
    },
    /// Disk of the given radius around the plane origin.
    Disk { radius: f64 },
}

#[derive(Debug, Clone)]
struct PrimitiveFace {
    surface: Arc<dyn Surface>,
    region: Region,
}

/// A primitive solid that tessellates itself.
#[derive(Debug, Clone)]
pub struct ParametricShape {
    name: &'static str,
    faces: Vec<PrimitiveFace>,
    meshes: Vec<Option<FaceMesh>>,
    location: Transform,
    deflection: Option<f64>,
}

impl ParametricShape {
    fn new(name: &'static str, faces: Vec<PrimitiveFace>) -> Self {
        let meshes = vec![None; faces.len()];
        Self {
            name,
            faces,
            meshes,
            location: Transform::identity(),
            deflection: None,
        }
    }

    /// Place the shape in world space. Existing meshes are relocated.
    pub fn with_location(mut self, location: Transform) -> Self {
        for mesh in self.meshes.iter_mut().flatten() {
            mesh.location = location.clone();
        }
        self.location = location;
        self
    }

    /// Short name of the primitive (`"box"`, `"sphere"`, `"cylinder"`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn tessellate_face(&self, face: &PrimitiveFace, deflection: f64) -> FaceMesh {
        let mut mesh = match face.region {
            Region::Rect {
                u,
                v,
                u_radius,
                v_radius,
            } => {
                let nu = u_radius.map_or(1, |r| segments_for_deflection(r, deflection, u.1 - u.0));
                let nv = v_radius.map_or(1, |r| segments_for_deflection(r, deflection, v.1 - v.0));
                grid_mesh(face.surface.as_ref(), u, v, nu, nv)
            }
            Region::Disk { radius } => {
                let n = segments_for_deflection(radius, deflection, 2.0 * PI);
                disk_mesh(face.surface.as_ref(), radius, n)
            }
        };
        mesh.location = self.location.clone();
        mesh
    }
}

impl TessellatedShape for ParametricShape {
    fn num_faces(&self) -> usize {
        self.faces.len()
    }

    fn face_mesh(&self, index: usize) -> Option<&FaceMesh> {
        self.meshes.get(index).and_then(Option::as_ref)
    }

    fn face_surface(&self, index: usize) -> Option<Arc<dyn Surface>> {
        self.faces.get(index).map(|f| f.surface.clone())
    }

    fn deflection(&self) -> Option<f64> {
        self.deflection
    }

    fn tessellate(&mut self, deflection: f64) -> Result<()> {
        if !deflection.is_finite() || deflection <= 0.0 {
            return Err(ShapeError::InvalidDeflection(deflection));
        }
        let meshes: Vec<Option<FaceMesh>> = self
            .faces
            .iter()
            .map(|face| Some(self.tessellate_face(face, deflection)))
            .collect();
        let triangles: usize = meshes.iter().flatten().map(FaceMesh::num_triangles).sum();
        log::debug!(
            "tessellated {} ({} faces) at deflection {}: {} triangles",
            self.name,
            self.faces.len(),
            deflection,
            triangles
        );
        self.meshes = meshes;
        self.deflection = Some(deflection);
        Ok(())
    }
}

/// Sample a rectangular parameter region on an `nu × nv` grid.
fn grid_mesh(surface: &dyn Surface, u: (f64, f64), v: (f64, f64), nu: usize, nv: usize) -> FaceMesh {
    let curved = !matches!(surface.surface_type(), crate::SurfaceKind::Plane);
    // A full periodic turn closes on its first column; reuse those nodes so
    // the seam has no rounding gap.
    let closes_u = surface.is_periodic_u() && ((u.1 - u.0) - 2.0 * PI).abs() < 1e-12;
    let mut mesh = FaceMesh::default();
    let mut normals = Vec::new();

    for j in 0..=nv {
        let pv = v.0 + (v.1 - v.0) * (j as f64 / nv as f64);
        let row_start = mesh.nodes.len();
        for i in 0..=nu {
            let pu = u.0 + (u.1 - u.0) * (i as f64 / nu as f64);
            let uv = Point2::new(pu, pv);
            mesh.uv_nodes.push(uv);
            if closes_u && i == nu {
                mesh.nodes.push(mesh.nodes[row_start]);
                if curved {
                    normals.push(normals[row_start]);
                }
                continue;
            }
            mesh.nodes.push(surface.evaluate(uv));
            if curved {
                normals.push(surface.normal(uv).into_inner());
            }
        }
    }

    let stride = (nu + 1) as u32;
    for j in 0..nv as u32 {
        for i in 0..nu as u32 {
            let a = j * stride + i;
            let b = a + 1;
            let c = b + stride;
            let d = a + stride;
            mesh.triangles.push([a, b, c]);
            mesh.triangles.push([a, c, d]);
        }
    }

    if curved {
        mesh.normals = Some(normals);
    }
    mesh
}

/// Fan-triangulate a disk around the plane origin.
fn disk_mesh(surface: &dyn Surface, radius: f64, segments: usize) -> FaceMesh {
    let mut mesh = FaceMesh::default();
    let center = Point2::origin();
    mesh.nodes.push(surface.evaluate(center));
    mesh.uv_nodes.push(center);

    for k in 0..segments {
        let angle = 2.0 * PI * (k as f64 / segments as f64);
        let uv = Point2::new(radius * angle.cos(), radius * angle.sin());
        mesh.nodes.push(surface.evaluate(uv));
        mesh.uv_nodes.push(uv);
    }

    let n = segments as u32;
    for k in 0..n {
        mesh.triangles.push([0, 1 + k, 1 + (k + 1) % n]);
    }
    mesh
}

fn check_dimensions(dims: &[(&str, f64)]) -> Result<()> {
    for (name, value) in dims {
        if !value.is_finite() || *value <= 0.0 {
            return Err(ShapeError::InvalidDimensions(format!(
                "{name} must be finite and > 0, got {value}"
            )));
        }
    }
    Ok(())
}

fn planar_rect(origin: Point3, x_dir: Vec3, y_dir: Vec3, du: f64, dv: f64) -> PrimitiveFace {
    PrimitiveFace {
        surface: Arc::new(Plane::new(origin, x_dir, y_dir)),
        region: Region::Rect {
            u: (0.0, du),
            v: (0.0, dv),
            u_radius: None,
            v_radius: None,
        },
    }
}

/// Box with one corner at the origin and extents `(sx, sy, sz)`.
///
/// Six planar faces, in order: bottom, top, front (y = 0), back, left
/// (x = 0), right. Every plane normal points out of the box.
pub fn make_box(sx: f64, sy: f64, sz: f64) -> Result<ParametricShape> {
    check_dimensions(&[("sx", sx), ("sy", sy), ("sz", sz)])?;
    let (x, y, z) = (Vec3::x(), Vec3::y(), Vec3::z());
    let faces = vec![
        planar_rect(Point3::origin(), y, x, sy, sx),
        planar_rect(Point3::new(0.0, 0.0, sz), x, y, sx, sy),
        planar_rect(Point3::origin(), x, z, sx, sz),
        planar_rect(Point3::new(0.0, sy, 0.0), z, x, sz, sx),
        planar_rect(Point3::origin(), z, y, sz, sy),
        planar_rect(Point3::new(sx, 0.0, 0.0), y, z, sy, sz),
    ];
    Ok(ParametricShape::new("box", faces))
}

/// Sphere of `radius` centered at the origin (a single face).
pub fn make_sphere(radius: f64) -> Result<ParametricShape> {
    check_dimensions(&[("radius", radius)])?;
    let surface = SphereSurface::new(radius);
    let ((u0, u1), (v0, v1)) = surface.domain();
    let faces = vec![PrimitiveFace {
        surface: Arc::new(surface),
        region: Region::Rect {
            u: (u0, u1),
            v: (v0, v1),
            u_radius: Some(radius),
            v_radius: Some(radius),
        },
    }];
    Ok(ParametricShape::new("sphere", faces))
}

/// Cylinder of `radius` standing on the XY plane, axis `+Z`, up to `height`.
///
/// Faces: lateral, bottom cap, top cap.
pub fn make_cylinder(radius: f64, height: f64) -> Result<ParametricShape> {
    check_dimensions(&[("radius", radius), ("height", height)])?;
    let faces = vec![
        PrimitiveFace {
            surface: Arc::new(CylinderSurface::new(radius)),
            region: Region::Rect {
                u: (0.0, 2.0 * PI),
                v: (0.0, height),
                u_radius: Some(radius),
                v_radius: None,
            },
        },
        PrimitiveFace {
            surface: Arc::new(Plane::new(Point3::origin(), Vec3::y(), Vec3::x())),
            region: Region::Disk { radius },
        },
        PrimitiveFace {
            surface: Arc::new(Plane::new(Point3::new(0.0, 0.0, height), Vec3::x(), Vec3::y())),
            region: Region::Disk { radius },
        },
    ];
    Ok(ParametricShape::new("cylinder", faces))
}
