//! Orthographic depth, normal and face-id maps.

use std::fmt;
use std::str::FromStr;

use bvhcast_math::{axis_value, Point3, Vec3};

use crate::error::{RaytraceError, Result};
use crate::ray::Ray;
use crate::raytracer::Raytracer;

/// Axis the view looks down; rays travel towards its negative end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewAxis {
    /// Side view: rays along `-X`, image plane spans `(y, z)`.
    X,
    /// Front view: rays along `-Y`, image plane spans `(x, z)`.
    Y,
    /// Top-down view: rays along `-Z`, image plane spans `(x, y)`.
    #[default]
    Z,
}

impl ViewAxis {
    fn index(self) -> usize {
        match self {
            ViewAxis::X => 0,
            ViewAxis::Y => 1,
            ViewAxis::Z => 2,
        }
    }

    /// Ray origin for image-plane coordinates `(a, b)` at `offset` along
    /// the axis.
    fn origin(self, a: f64, b: f64, offset: f64) -> Point3 {
        match self {
            ViewAxis::X => Point3::new(offset, a, b),
            ViewAxis::Y => Point3::new(a, offset, b),
            ViewAxis::Z => Point3::new(a, b, offset),
        }
    }

    fn direction(self) -> Vec3 {
        let mut d = Vec3::zeros();
        d[self.index()] = -1.0;
        d
    }
}

impl FromStr for ViewAxis {
    type Err = RaytraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(ViewAxis::X),
            "y" => Ok(ViewAxis::Y),
            "z" => Ok(ViewAxis::Z),
            _ => Err(RaytraceError::InvalidConfig(format!(
                "axis must be 'x', 'y', or 'z', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ViewAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewAxis::X => "x",
            ViewAxis::Y => "y",
            ViewAxis::Z => "z",
        })
    }
}

/// An orthographic view: a `width × height` grid of parallel rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoView {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// `[xmin, ymin, xmax, ymax]` in image-plane coordinates.
    pub bounds: [f64; 4],
    /// View axis.
    pub axis: ViewAxis,
    /// Start of every ray along the view axis.
    pub offset: f64,
}

impl OrthoView {
    /// Top-down view with rays starting at 100 along `+Z`.
    pub fn new(width: usize, height: usize, bounds: [f64; 4]) -> Self {
        Self {
            width,
            height,
            bounds,
            axis: ViewAxis::Z,
            offset: 100.0,
        }
    }

    /// Look down `axis` instead.
    pub fn with_axis(mut self, axis: ViewAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Start rays at `offset` along the view axis.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RaytraceError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.bounds.iter().all(|b| b.is_finite()) || !self.offset.is_finite() {
            return Err(RaytraceError::InvalidConfig("view bounds and offset must be finite".into()));
        }
        Ok(())
    }

    /// One ray per pixel, row-major with row 0 at `ymax`.
    fn rays(&self) -> Vec<Option<Ray>> {
        let [xmin, ymin, xmax, ymax] = self.bounds;
        let xs = linspace(xmin, xmax, self.width);
        let ys = linspace(ymax, ymin, self.height);
        let direction = self.axis.direction();
        let mut rays = Vec::with_capacity(self.width * self.height);
        for &y in &ys {
            for &x in &xs {
                rays.push(Ray::new(self.axis.origin(x, y, self.offset), direction).ok());
            }
        }
        rays
    }
}

/// `n` evenly spaced samples from `start` to `stop`, both included.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut v: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            v[n - 1] = stop;
            v
        }
    }
}

/// Rendered maps, row-major `height × width`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthoImage {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Hit coordinate along the view axis, `NaN` on miss.
    pub depth: Vec<f32>,
    /// Unit normals, zero on miss.
    pub normals: Vec<[f32; 3]>,
    /// Face ids, `-1` on miss.
    pub face_ids: Vec<i32>,
    /// True if the render was cancelled part way.
    pub cancelled: bool,
}

impl OrthoImage {
    /// Depth at a pixel.
    pub fn depth_at(&self, row: usize, col: usize) -> f32 {
        self.depth[row * self.width + col]
    }

    /// Number of pixels that hit the shape.
    pub fn hit_count(&self) -> usize {
        self.face_ids.iter().filter(|&&id| id >= 0).count()
    }

    /// Finite depth range over all hit pixels.
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        self.depth
            .iter()
            .filter(|d| d.is_finite())
            .fold(None, |acc, &d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }
}

impl Raytracer {
    /// Render depth, normal and face-id maps of the loaded shape.
    pub fn render_orthographic(&self, view: &OrthoView) -> Result<OrthoImage> {
        view.validate()?;
        let rays = view.rays();
        let dispatched = self.run(&rays, None)?;
        let axis = view.axis.index();

        let n = dispatched.hits.len();
        let mut image = OrthoImage {
            width: view.width,
            height: view.height,
            depth: Vec::with_capacity(n),
            normals: Vec::with_capacity(n),
            face_ids: Vec::with_capacity(n),
            cancelled: dispatched.cancelled,
        };
        for hit in &dispatched.hits {
            if hit.valid {
                image.depth.push(axis_value(&hit.point, axis) as f32);
                image.normals.push([hit.normal.x as f32, hit.normal.y as f32, hit.normal.z as f32]);
                image.face_ids.push(hit.face_id as i32);
            } else {
                image.depth.push(f32::NAN);
                image.normals.push([0.0; 3]);
                image.face_ids.push(-1);
            }
        }
        log::debug!(
            "rendered {}x{} view along {}: {} of {} pixels hit",
            view.width,
            view.height,
            view.axis,
            image.hit_count(),
            n
        );
        Ok(image)
    }
}
