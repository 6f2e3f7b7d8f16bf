#![warn(missing_docs)]

//! BVH-accelerated ray casting against tessellated B-rep shapes.
//!
//! A shape's faces are flattened into one triangle soup, a bounding volume
//! hierarchy is built over it, and rays are traversed through that hierarchy
//! by one of several interchangeable backends. Hits are mapped back to the
//! face they came from with UV parameters and a surface normal.
//!
//! # Architecture
//!
//! - [`adapter`] - shape faces to a triangle soup, tessellating on demand
//! - [`bvh`] - SAH bounding volume hierarchy and its flattened form
//! - [`traverse`] - scalar, flattened and 4/8-wide packet traversal kernels
//! - [`backend`] - backend names and runtime kernel selection
//! - [`resolve`] - raw hits to [`HitResult`]s
//! - [`dispatch`] - batches over a kernel, optionally in parallel
//! - [`Raytracer`] - the facade tying these together
//!
//! # Example
//!
//! ```
//! use bvhcast::{Raytracer, RaytracerConfig};
//! use bvhcast_math::{Point3, Vec3};
//! use bvhcast_shape::make_sphere;
//!
//! let mut sphere = make_sphere(50.0).unwrap();
//! let rt = Raytracer::with_shape(&mut sphere, RaytracerConfig::default()).unwrap();
//!
//! let hit = rt
//!     .cast_single(Point3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 0.0, -1.0), 0.0, f64::MAX)
//!     .unwrap();
//! assert!(hit.valid);
//! assert!((hit.w - 50.0).abs() < 0.1);
//! ```

pub mod adapter;
pub mod backend;
pub mod bvh;
mod config;
pub mod dispatch;
mod error;
mod ray;
mod raytracer;
mod render;
pub mod resolve;
pub mod scene;
mod triangle;
pub mod traverse;

pub use backend::{available_backends, select, Backend};
pub use bvh::{Bvh, BvhStats};
pub use config::RaytracerConfig;
pub use dispatch::{BatchResult, DispatchOptions};
pub use error::{RaytraceError, Result};
pub use ray::Ray;
pub use raytracer::{PointClass, Raytracer};
pub use render::{OrthoImage, OrthoView, ViewAxis};
pub use resolve::HitResult;
pub use scene::{load, LoadedScene};
pub use traverse::{Kernel, RawHit};
pub use triangle::Triangle;
