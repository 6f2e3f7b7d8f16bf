//! bvhcast CLI - ray cast primitive B-rep shapes from the terminal
//!
//! Renders orthographic depth maps, casts single rays and reports scene
//! statistics for the built-in box, sphere and cylinder shapes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use bvhcast::{available_backends, Backend, OrthoView, Ray, Raytracer, RaytracerConfig, ViewAxis};
use bvhcast_math::{Point3, Vec3};
use bvhcast_shape::{make_box, make_cylinder, make_sphere, ParametricShape};

mod output;

#[derive(Parser)]
#[command(name = "bvhcast")]
#[command(about = "BVH ray casting against tessellated B-rep shapes", long_about = None)]
struct Cli {
    /// TOML file with raytracer settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Traversal backend (scalar, accelerated, simd4, simd8)
    #[arg(short, long, global = true)]
    backend: Option<Backend>,

    /// Tessellation deflection
    #[arg(long, global = true)]
    deflection: Option<f64>,

    /// UV clamping tolerance
    #[arg(long, global = true)]
    tolerance: Option<f64>,

    /// Cast batches on the calling thread only
    #[arg(long, global = true)]
    no_parallel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeKind {
    #[value(name = "box")]
    Cuboid,
    Sphere,
    Cylinder,
}

#[derive(clap::Args)]
struct ShapeArgs {
    /// Primitive to load
    #[arg(short, long, value_enum, default_value = "sphere")]
    shape: ShapeKind,

    /// Comma-separated dimensions: box sx,sy,sz; sphere r; cylinder r,h
    #[arg(long)]
    dims: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an orthographic depth map to PNG
    Render {
        #[command(flatten)]
        shape: ShapeArgs,
        /// Output PNG file
        output: PathBuf,
        /// Image size as WIDTHxHEIGHT
        #[arg(short, long, default_value = "256x256")]
        resolution: String,
        /// Image-plane bounds xmin,ymin,xmax,ymax (default: fit the shape)
        #[arg(long)]
        bounds: Option<String>,
        /// View axis (x, y or z)
        #[arg(short, long, default_value = "z")]
        axis: ViewAxis,
        /// Ray start along the view axis
        #[arg(long, default_value_t = 100.0)]
        offset: f64,
        /// Also write a normal map to this PNG file
        #[arg(long)]
        normals: Option<PathBuf>,
    },
    /// Cast one ray and print the hit as JSON
    Cast {
        #[command(flatten)]
        shape: ShapeArgs,
        /// Ray origin x,y,z
        #[arg(short, long, allow_hyphen_values = true)]
        origin: String,
        /// Ray direction x,y,z
        #[arg(short, long, allow_hyphen_values = true)]
        direction: String,
        /// Start of the hit window
        #[arg(long, default_value_t = 0.0)]
        min_dist: f64,
        /// End of the hit window
        #[arg(long, default_value_t = f64::MAX)]
        max_dist: f64,
        /// Report every hit along the ray instead of the nearest
        #[arg(long)]
        all: bool,
    },
    /// Classify a point as inside, outside or on the boundary
    Classify {
        #[command(flatten)]
        shape: ShapeArgs,
        /// Point x,y,z
        #[arg(allow_hyphen_values = true)]
        point: String,
    },
    /// Display face, triangle and BVH statistics for a shape
    Info {
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// List backends and whether this build and CPU support them
    Backends,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Render {
            shape,
            output,
            resolution,
            bounds,
            axis,
            offset,
            normals,
        } => {
            let rt = load_raytracer(&cli, shape)?;
            let (width, height) = parse_resolution(resolution)?;
            let bounds = match bounds {
                Some(s) => parse_floats::<4>(s, "bounds")?,
                None => fit_bounds(shape, *axis)?,
            };
            let view = OrthoView::new(width, height, bounds)
                .with_axis(*axis)
                .with_offset(*offset);
            render(&rt, &view, output, normals.as_deref())?;
        }
        Commands::Cast {
            shape,
            origin,
            direction,
            min_dist,
            max_dist,
            all,
        } => {
            let rt = load_raytracer(&cli, shape)?;
            let origin = Point3::from(parse_floats::<3>(origin, "origin")?);
            let direction = Vec3::from(parse_floats::<3>(direction, "direction")?);
            if *all {
                let ray = Ray::with_window(origin, direction, *min_dist, *max_dist)?;
                let hits = rt.intersect_all(&ray)?;
                let views: Vec<_> = hits.iter().map(output::HitView::from).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                let hit = rt.cast_single(origin, direction, *min_dist, *max_dist)?;
                println!("{}", serde_json::to_string_pretty(&output::HitView::from(&hit))?);
            }
        }
        Commands::Classify { shape, point } => {
            let rt = load_raytracer(&cli, shape)?;
            let point = Point3::from(parse_floats::<3>(point, "point")?);
            println!("{:?}", rt.classify_point(point)?);
        }
        Commands::Info { shape } => {
            let rt = load_raytracer(&cli, shape)?;
            show_info(&rt)?;
        }
        Commands::Backends => {
            for backend in Backend::ALL {
                let status = if backend.is_available() { "available" } else { "unavailable" };
                println!("{:<12} width {}  {}", backend.name(), backend.width(), status);
            }
        }
    }

    Ok(())
}

/// Settings from `--config`, then overridden by explicit flags.
fn load_config(cli: &Cli) -> Result<RaytracerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RaytracerConfig::from_toml_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => RaytracerConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(deflection) = cli.deflection {
        config.deflection = deflection;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    if cli.no_parallel {
        config.parallel = false;
    }
    Ok(config)
}

fn load_raytracer(cli: &Cli, shape: &ShapeArgs) -> Result<Raytracer> {
    let config = load_config(cli)?;
    if !config.backend.is_available() {
        let names: Vec<_> = available_backends().iter().map(|b| b.name()).collect();
        bail!(
            "backend '{}' is not available here (available: {})",
            config.backend,
            names.join(", ")
        );
    }
    let mut primitive = make_shape(shape)?;
    let rt = Raytracer::with_shape(&mut primitive, config)?;
    log::info!("{rt}");
    Ok(rt)
}

fn shape_dims(shape: &ShapeArgs) -> Result<Vec<f64>> {
    let dims = match &shape.dims {
        Some(s) => parse_list(s, "dims")?,
        None => match shape.shape {
            ShapeKind::Cuboid => vec![10.0, 20.0, 30.0],
            ShapeKind::Sphere => vec![50.0],
            ShapeKind::Cylinder => vec![5.0, 10.0],
        },
    };
    let expected = match shape.shape {
        ShapeKind::Cuboid => 3,
        ShapeKind::Sphere => 1,
        ShapeKind::Cylinder => 2,
    };
    if dims.len() != expected {
        bail!("expected {expected} dimension(s), got {}", dims.len());
    }
    Ok(dims)
}

fn make_shape(shape: &ShapeArgs) -> Result<ParametricShape> {
    let d = shape_dims(shape)?;
    let primitive = match shape.shape {
        ShapeKind::Cuboid => make_box(d[0], d[1], d[2])?,
        ShapeKind::Sphere => make_sphere(d[0])?,
        ShapeKind::Cylinder => make_cylinder(d[0], d[1])?,
    };
    Ok(primitive)
}

/// Image-plane bounds enclosing the shape's silhouette with a 10% margin.
fn fit_bounds(shape: &ShapeArgs, axis: ViewAxis) -> Result<[f64; 4]> {
    let d = shape_dims(shape)?;
    let (min, max) = match shape.shape {
        ShapeKind::Cuboid => ([0.0; 3], [d[0], d[1], d[2]]),
        ShapeKind::Sphere => ([-d[0]; 3], [d[0]; 3]),
        ShapeKind::Cylinder => ([-d[0], -d[0], 0.0], [d[0], d[0], d[1]]),
    };
    let (a, b) = match axis {
        ViewAxis::X => (1, 2),
        ViewAxis::Y => (0, 2),
        ViewAxis::Z => (0, 1),
    };
    let margin = 0.1 * (max[a] - min[a]).max(max[b] - min[b]);
    Ok([min[a] - margin, min[b] - margin, max[a] + margin, max[b] + margin])
}

fn render(rt: &Raytracer, view: &OrthoView, output: &Path, normals: Option<&Path>) -> Result<()> {
    let image = rt.render_orthographic(view)?;
    output::save_depth_png(&image, output)?;
    println!(
        "Wrote {}x{} depth map to {} ({} of {} pixels hit)",
        image.width,
        image.height,
        output.display(),
        image.hit_count(),
        image.depth.len()
    );
    if let Some(path) = normals {
        output::save_normal_png(&image, path)?;
        println!("Wrote normal map to {}", path.display());
    }
    Ok(())
}

fn show_info(rt: &Raytracer) -> Result<()> {
    let scene = rt.scene()?;
    let stats = scene.bvh().stats();
    println!("Backend:       {}", rt.backend());
    println!("Parallel:      {}", rt.parallel());
    println!("Deflection:    {}", scene.deflection());
    println!("Tolerance:     {}", scene.tolerance());
    println!("Faces:         {}", scene.num_faces());
    println!("Triangles:     {}", scene.num_triangles());
    println!();
    println!("BVH:");
    println!("  Nodes:       {}", stats.nodes);
    println!("  Leaves:      {}", stats.leaves);
    println!("  Depth:       {}", stats.depth);
    println!("  Max leaf:    {}", stats.max_leaf_size);
    Ok(())
}

fn parse_resolution(s: &str) -> Result<(usize, usize)> {
    let Some((w, h)) = s.split_once(['x', 'X']) else {
        bail!("resolution must look like WIDTHxHEIGHT, got '{s}'");
    };
    let width: usize = w.trim().parse().with_context(|| format!("bad width '{w}'"))?;
    let height: usize = h.trim().parse().with_context(|| format!("bad height '{h}'"))?;
    Ok((width, height))
}

fn parse_list(s: &str, what: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("bad number '{part}' in {what}"))
        })
        .collect()
}

fn parse_floats<const N: usize>(s: &str, what: &str) -> Result<[f64; N]> {
    let values = parse_list(s, what)?;
    match <[f64; N]>::try_from(values.as_slice()) {
        Ok(array) => Ok(array),
        Err(_) => bail!("{what} needs {N} comma-separated numbers, got {}", values.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("640x480").unwrap(), (640, 480));
        assert_eq!(parse_resolution("8X2").unwrap(), (8, 2));
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("ax2").is_err());
    }

    #[test]
    fn test_parse_floats() {
        assert_eq!(parse_floats::<3>("1, -2.5,3", "origin").unwrap(), [1.0, -2.5, 3.0]);
        assert!(parse_floats::<3>("1,2", "origin").is_err());
        assert!(parse_floats::<3>("1,2,z", "origin").is_err());
    }

    #[test]
    fn test_shape_dims() {
        let args = ShapeArgs {
            shape: ShapeKind::Cylinder,
            dims: None,
        };
        assert_eq!(shape_dims(&args).unwrap(), vec![5.0, 10.0]);
        let args = ShapeArgs {
            shape: ShapeKind::Cuboid,
            dims: Some("1,2".into()),
        };
        assert!(shape_dims(&args).is_err());
    }

    #[test]
    fn test_fit_bounds_box_top() {
        let args = ShapeArgs {
            shape: ShapeKind::Cuboid,
            dims: Some("10,20,30".into()),
        };
        assert_eq!(fit_bounds(&args, ViewAxis::Z).unwrap(), [-2.0, -2.0, 12.0, 22.0]);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "bvhcast", "cast", "--shape", "box", "-o", "5,7,100", "-d", "0,0,-1", "-b", "simd4",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(Backend::Simd4));
        assert!(matches!(cli.command, Commands::Cast { .. }));
        let config = load_config(&cli).unwrap();
        assert_eq!(config.backend, Backend::Simd4);
        assert!(config.parallel);
    }
}
