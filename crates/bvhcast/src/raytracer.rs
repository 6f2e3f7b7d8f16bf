//! The [`Raytracer`]: owns the loaded scene and answers ray queries.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock};

use bvhcast_math::{Point3, Vec3};
use bvhcast_shape::TessellatedShape;

use crate::backend::{select, Backend};
use crate::config::RaytracerConfig;
use crate::dispatch::{dispatch, BatchResult, DispatchOptions, Dispatched};
use crate::error::{RaytraceError, Result};
use crate::ray::Ray;
use crate::resolve::{resolve, HitResult};
use crate::scene::{self, LoadedScene};
use crate::traverse::Kernel;

/// Direction used for inside/outside parity counting. Skewed so that it is
/// unlikely to run along edges or faces of axis-aligned geometry.
const CLASSIFY_DIRECTION: [f64; 3] = [0.301_511_344, 0.514_495_755, 0.802_955_925];

/// Where a point lies relative to a closed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClass {
    /// Inside the material.
    Inside,
    /// Outside the material.
    Outside,
    /// Within the load tolerance of the surface.
    OnBoundary,
}

/// Ray casting engine bound to one shape at a time.
///
/// Queries take `&self` and may run from several threads. Loading swaps the
/// scene atomically: queries in flight keep the scene they started with, and
/// a failed load leaves the previous scene in place.
pub struct Raytracer {
    scene: RwLock<Option<Arc<LoadedScene>>>,
    config: RaytracerConfig,
    kernel: Kernel,
}

impl Raytracer {
    /// Create an engine with no shape loaded.
    ///
    /// Fails if the configuration is invalid or its backend is unavailable.
    pub fn new(config: RaytracerConfig) -> Result<Self> {
        config.validate()?;
        let kernel = select(config.backend)?;
        log::info!(
            "raytracer using backend '{}' (parallel={})",
            config.backend,
            config.parallel
        );
        Ok(Self {
            scene: RwLock::new(None),
            config,
            kernel,
        })
    }

    /// Create an engine and load `shape`.
    pub fn with_shape(shape: &mut dyn TessellatedShape, config: RaytracerConfig) -> Result<Self> {
        let raytracer = Self::new(config)?;
        raytracer.load(shape)?;
        Ok(raytracer)
    }

    /// Load a shape with the configured tolerance and deflection.
    pub fn load(&self, shape: &mut dyn TessellatedShape) -> Result<()> {
        self.load_with(shape, self.config.tolerance, self.config.deflection)
    }

    /// Load a shape, replacing any previous one.
    ///
    /// The scene is built without holding the lock; only the final swap
    /// excludes readers.
    pub fn load_with(&self, shape: &mut dyn TessellatedShape, tolerance: f64, deflection: f64) -> Result<()> {
        let scene = scene::load(shape, tolerance, deflection)?;
        log::info!(
            "loaded shape: {} faces, {} triangles (deflection {deflection})",
            scene.num_faces(),
            scene.num_triangles()
        );
        let scene = Arc::new(scene);
        *self.scene.write().unwrap_or_else(PoisonError::into_inner) = Some(scene);
        Ok(())
    }

    /// Switch backend. On failure the current backend stays selected.
    pub fn set_backend(&mut self, backend: Backend) -> Result<()> {
        self.kernel = select(backend)?;
        self.config.backend = backend;
        log::info!("backend set to '{backend}'");
        Ok(())
    }

    /// Selected backend.
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    /// Enable or disable parallel batches.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.config.parallel = parallel;
    }

    /// True if batches run in parallel.
    pub fn parallel(&self) -> bool {
        self.config.parallel
    }

    /// Current settings.
    pub fn config(&self) -> &RaytracerConfig {
        &self.config
    }

    /// True once a shape has loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Face count of the loaded shape, 0 if none.
    pub fn num_faces(&self) -> usize {
        self.current().map_or(0, |s| s.num_faces())
    }

    /// Triangle count of the loaded shape, 0 if none.
    pub fn num_triangles(&self) -> usize {
        self.current().map_or(0, |s| s.num_triangles())
    }

    /// The loaded scene.
    pub fn scene(&self) -> Result<Arc<LoadedScene>> {
        self.current().ok_or(RaytraceError::NotLoaded)
    }

    fn current(&self) -> Option<Arc<LoadedScene>> {
        self.scene.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Cast one ray restricted to `[min_dist, max_dist]`.
    pub fn cast_single(&self, origin: Point3, direction: Vec3, min_dist: f64, max_dist: f64) -> Result<HitResult> {
        let scene = self.scene()?;
        let ray = Ray::with_window(origin, direction, min_dist, max_dist)?;
        Ok(self.nearest(&scene, &ray))
    }

    /// Cast one prepared ray.
    pub fn cast_ray(&self, ray: &Ray) -> Result<HitResult> {
        let scene = self.scene()?;
        Ok(self.nearest(&scene, ray))
    }

    fn nearest(&self, scene: &LoadedScene, ray: &Ray) -> HitResult {
        self.kernel
            .intersect_nearest(scene, ray)
            .map_or_else(HitResult::miss, |raw| resolve(scene, ray, &raw))
    }

    /// Every hit along the ray, nearest first.
    pub fn intersect_all(&self, ray: &Ray) -> Result<Vec<HitResult>> {
        let scene = self.scene()?;
        Ok(self
            .kernel
            .intersect_all(&scene, ray)
            .iter()
            .map(|raw| resolve(&scene, ray, raw))
            .collect())
    }

    /// Cast `origins[i]` along `directions[i]` for every `i`.
    ///
    /// Malformed rays (zero or non-finite direction, non-finite origin) come
    /// back as misses; they do not fail the batch.
    pub fn cast_batch(&self, origins: &[Point3], directions: &[Vec3]) -> Result<BatchResult> {
        let rays = make_rays(origins, directions)?;
        Ok(self.run(&rays, None)?.into())
    }

    /// Like [`Raytracer::cast_batch`], stopping early once `cancel` is set.
    ///
    /// Rays not cast before cancellation are misses and the result has
    /// `cancelled` set.
    pub fn cast_batch_cancellable(
        &self,
        origins: &[Point3],
        directions: &[Vec3],
        cancel: &AtomicBool,
    ) -> Result<BatchResult> {
        let rays = make_rays(origins, directions)?;
        Ok(self.run(&rays, Some(cancel))?.into())
    }

    /// Cast prepared rays, one result per ray in input order.
    pub fn cast_rays(&self, rays: &[Ray]) -> Result<Vec<HitResult>> {
        let rays: Vec<Option<Ray>> = rays.iter().copied().map(Some).collect();
        Ok(self.run(&rays, None)?.hits)
    }

    /// Dispatch a batch where `None` entries are inert.
    pub(crate) fn run(&self, rays: &[Option<Ray>], cancel: Option<&AtomicBool>) -> Result<Dispatched> {
        let scene = self.scene()?;
        let options = DispatchOptions {
            parallel: self.config.parallel,
            cancel,
        };
        Ok(dispatch(&scene, rays, self.kernel, &options))
    }

    /// Classify a point against the loaded shape by counting surface
    /// crossings along a fixed ray.
    ///
    /// A surface within the load tolerance ahead of or behind the point
    /// makes it `OnBoundary`. Only meaningful for closed shapes.
    pub fn classify_point(&self, point: Point3) -> Result<PointClass> {
        let scene = self.scene()?;
        let [x, y, z] = CLASSIFY_DIRECTION;
        let dir = Vec3::new(x, y, z);
        let ray = Ray::new(point, dir)?;
        let hits = self.kernel.intersect_all(&scene, &ray);

        // A surface just behind the point is as close as one just ahead.
        let back = Ray::new(point, -dir)?;
        let behind = self.kernel.intersect_nearest(&scene, &back);
        if hits.first().is_some_and(|h| h.t <= scene.tolerance())
            || behind.is_some_and(|h| h.t <= scene.tolerance())
        {
            return Ok(PointClass::OnBoundary);
        }
        // Hits on a shared edge or vertex report one crossing per adjacent
        // triangle; count each distance once.
        let mut crossings = 0usize;
        let mut last = f64::NEG_INFINITY;
        for hit in &hits {
            if hit.t - last > 1e-9 * hit.t.max(1.0) {
                crossings += 1;
                last = hit.t;
            }
        }
        Ok(if crossings % 2 == 1 {
            PointClass::Inside
        } else {
            PointClass::Outside
        })
    }
}

/// Build rays from parallel arrays; malformed entries become inert lanes.
fn make_rays(origins: &[Point3], directions: &[Vec3]) -> Result<Vec<Option<Ray>>> {
    if origins.len() != directions.len() {
        return Err(RaytraceError::BatchShape {
            origins: origins.len(),
            directions: directions.len(),
        });
    }
    let rays: Vec<Option<Ray>> = origins
        .iter()
        .zip(directions)
        .map(|(o, d)| Ray::new(*o, *d).ok())
        .collect();
    let invalid = rays.iter().filter(|r| r.is_none()).count();
    if invalid > 0 {
        log::debug!("{invalid} of {} rays are malformed and will miss", rays.len());
    }
    Ok(rays)
}

impl fmt::Display for Raytracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Raytracer(faces={}, backend='{}', parallel={})",
            self.num_faces(),
            self.backend(),
            self.parallel()
        )
    }
}

impl fmt::Debug for Raytracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raytracer")
            .field("faces", &self.num_faces())
            .field("triangles", &self.num_triangles())
            .field("config", &self.config)
            .finish()
    }
}
