//! End-to-end properties of the ray casting engine, run against every
//! backend available in this build.

use std::sync::atomic::AtomicBool;

use approx::assert_relative_eq;
use bvhcast::{
    available_backends, load, select, Backend, PointClass, Ray, RaytraceError, Raytracer,
    RaytracerConfig,
};
use bvhcast_math::{Point3, Vec3};
use bvhcast_shape::{make_box, make_cylinder, make_sphere};

fn sphere(backend: Backend, parallel: bool) -> Raytracer {
    let mut shape = make_sphere(50.0).unwrap();
    let config = RaytracerConfig {
        backend,
        parallel,
        ..Default::default()
    };
    Raytracer::with_shape(&mut shape, config).unwrap()
}

/// A grid of downward rays over `[-60, 60]²`, about half of them hitting.
fn grid(n: usize) -> (Vec<Point3>, Vec<Vec3>) {
    let mut origins = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = -60.0 + 120.0 * i as f64 / (n - 1) as f64;
            let y = -60.0 + 120.0 * j as f64 / (n - 1) as f64;
            origins.push(Point3::new(x, y, 100.0));
        }
    }
    let directions = vec![Vec3::new(0.0, 0.0, -1.0); n * n];
    (origins, directions)
}

#[test]
fn sphere_round_trip_on_every_backend() {
    for backend in available_backends() {
        let rt = sphere(backend, true);
        let hit = rt
            .cast_single(Point3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 0.0, -1.0), 0.0, f64::MAX)
            .unwrap();
        assert!(hit.valid, "{backend}");
        assert_relative_eq!(hit.point, Point3::new(0.0, 0.0, 50.0), epsilon = 1e-6);
        assert_relative_eq!(hit.normal, Vec3::z(), epsilon = 1e-6);
        assert!((hit.w - 50.0).abs() < 0.1);
        assert_eq!(hit.face_id, 0);

        let miss = rt
            .cast_single(Point3::new(1000.0, 0.0, 100.0), Vec3::new(0.0, 0.0, -1.0), 0.0, f64::MAX)
            .unwrap();
        assert!(!miss.valid, "{backend}");
    }
}

#[test]
fn hit_points_lie_within_deflection_of_sphere() {
    let rt = sphere(Backend::Scalar, true);
    let (origins, directions) = grid(25);
    let batch = rt.cast_batch(&origins, &directions).unwrap();
    assert!(batch.hit_count() > 0);
    for (i, hit) in batch.hits.iter().enumerate() {
        let [x, y, z] = batch.points[i];
        let r = (x * x + y * y + z * z).sqrt();
        if *hit {
            // Facet interiors sag below the sphere by at most about twice the
            // per-direction deflection.
            assert!(r <= 50.0 + 1e-9 && r >= 50.0 - 0.25, "radius {r}");
            let [nx, ny, nz] = batch.normals[i];
            assert_relative_eq!((nx * nx + ny * ny + nz * nz).sqrt(), 1.0, epsilon = 1e-9);
        }
        let (ox, oy) = (origins[i].x, origins[i].y);
        if (ox * ox + oy * oy).sqrt() > 50.0 {
            assert!(!hit, "ray outside the silhouette hit at ({ox}, {oy})");
        }
    }
}

#[test]
fn builds_are_deterministic() {
    let mut a = make_cylinder(7.0, 12.0).unwrap();
    let mut b = make_cylinder(7.0, 12.0).unwrap();
    let sa = load(&mut a, 0.001, 0.05).unwrap();
    let sb = load(&mut b, 0.001, 0.05).unwrap();
    assert_eq!(sa.bvh().order(), sb.bvh().order());
    assert_eq!(sa.bvh().stats(), sb.bvh().stats());
    sa.bvh().check_invariants(sa.triangles()).unwrap();

    // Rays from all around, converging on the axis.
    let mut rays = Vec::new();
    for k in 0..24 {
        let angle = k as f64 * std::f64::consts::TAU / 24.0;
        let origin = Point3::new(40.0 * angle.cos(), 40.0 * angle.sin(), -10.0 + k as f64 * 1.5);
        let target = Point3::new(0.3, -0.2, 1.0 + 0.4 * k as f64);
        rays.push(Ray::new(origin, target - origin).unwrap());
    }
    for backend in available_backends() {
        let kernel = select(backend).unwrap();
        for ray in &rays {
            let hit = kernel.intersect_nearest(&sa, ray);
            assert!(hit.is_some(), "{backend}");
            assert_eq!(hit, kernel.intersect_nearest(&sb, ray), "{backend}");
        }
    }

    let origins: Vec<Point3> = rays.iter().map(|r| r.origin).collect();
    let directions: Vec<Vec3> = rays.iter().map(|r| r.direction.into_inner()).collect();
    let ra = Raytracer::new(RaytracerConfig::default()).unwrap();
    let rb = Raytracer::new(RaytracerConfig::default()).unwrap();
    ra.load_with(&mut a, 0.001, 0.05).unwrap();
    rb.load_with(&mut b, 0.001, 0.05).unwrap();
    let first = ra.cast_batch(&origins, &directions).unwrap();
    let second = rb.cast_batch(&origins, &directions).unwrap();
    assert_eq!(first, second);
}

#[test]
fn batch_matches_single_ray_per_backend() {
    let (origins, directions) = grid(9);
    for backend in available_backends() {
        let rt = sphere(backend, false);
        let batch = rt.cast_batch(&origins, &directions).unwrap();
        for i in 0..origins.len() {
            let single = rt.cast_single(origins[i], directions[i], 0.0, f64::MAX).unwrap();
            assert_eq!(batch.hits[i], single.valid, "{backend} ray {i}");
            if single.valid {
                assert_eq!(batch.ws[i], single.w);
                assert_eq!(batch.points[i], <[f64; 3]>::from(single.point.coords));
            }
        }
    }
}

#[test]
fn batch_order_and_length_preserved() {
    for backend in available_backends() {
        for parallel in [false, true] {
            let rt = sphere(backend, parallel);
            for n in [1usize, 5, 9, 100] {
                // Ray i starts at x = i - 50.5: it hits well inside the
                // silhouette and misses outside the sphere.
                let origins: Vec<Point3> = (0..n)
                    .map(|i| Point3::new(i as f64 - 50.5, 0.3, 100.0))
                    .collect();
                let directions = vec![-Vec3::z(); n];
                let batch = rt.cast_batch(&origins, &directions).unwrap();
                assert_eq!(batch.len(), n);
                for (i, o) in origins.iter().enumerate() {
                    let expect_hit = o.x.abs() < 49.0;
                    if expect_hit {
                        assert!(batch.hits[i], "{backend} n={n} i={i}");
                        assert_relative_eq!(batch.points[i][0], o.x, epsilon = 1e-9);
                    } else if o.x.abs() > 50.0 {
                        assert!(!batch.hits[i], "{backend} n={n} i={i}");
                    }
                }
            }
        }
    }
}

#[test]
fn backends_agree() {
    let mut shape = make_cylinder(20.0, 40.0).unwrap();
    let scene_rays: Vec<Ray> = (0..300)
        .map(|i| {
            let a = i as f64 * 0.173;
            let origin = Point3::new(90.0 * a.cos(), 90.0 * a.sin(), 20.0 + 30.0 * (a * 0.7).sin());
            let target = Point3::new(8.0 * (a * 2.3).cos(), 8.0 * (a * 1.9).sin(), 20.0 + 25.0 * (a * 0.3).cos());
            Ray::new(origin, target - origin).unwrap()
        })
        .collect();

    let reference = Raytracer::with_shape(&mut shape, RaytracerConfig::default()).unwrap();
    let expected = reference.cast_rays(&scene_rays).unwrap();
    for backend in available_backends() {
        let mut rt = Raytracer::with_shape(&mut shape, RaytracerConfig::default()).unwrap();
        rt.set_backend(backend).unwrap();
        let got = rt.cast_rays(&scene_rays).unwrap();
        for (e, g) in expected.iter().zip(&got) {
            assert_eq!(e.valid, g.valid, "{backend}");
            if e.valid {
                assert_relative_eq!(e.point, g.point, epsilon = 1e-9);
                assert_relative_eq!(e.w, g.w, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn clamp_window_is_honoured() {
    let mut shape = make_box(10.0, 20.0, 30.0).unwrap();
    let rt = Raytracer::with_shape(&mut shape, RaytracerConfig::default()).unwrap();
    let origin = Point3::new(5.0, 7.0, 100.0);
    let down = -Vec3::z();

    let near = rt.cast_single(origin, down, 0.0, f64::MAX).unwrap();
    assert_relative_eq!(near.w, 70.0, epsilon = 1e-9);
    // Top face excluded: the bottom face is next.
    let far = rt.cast_single(origin, down, 70.5, f64::MAX).unwrap();
    assert_relative_eq!(far.w, 100.0, epsilon = 1e-9);
    assert_ne!(far.face_id, near.face_id);
    // Window ends before the shape.
    assert!(!rt.cast_single(origin, down, 0.0, 69.5).unwrap().valid);
    // Window boundaries are inclusive.
    let hit = rt.cast_single(origin, down, 0.0, near.w).unwrap();
    assert!(hit.valid);
    // A window wholly behind the origin holds nothing.
    assert!(!rt.cast_single(origin, down, -5.0, -3.0).unwrap().valid);
}

#[test]
fn invalid_rays_in_batch_are_isolated() {
    let rt = sphere(Backend::Scalar, true);
    let origins = vec![
        Point3::new(0.0, 0.0, 100.0),
        Point3::new(f64::NAN, 0.0, 100.0),
        Point3::new(0.0, 0.0, 100.0),
        Point3::new(0.0, 0.0, 100.0),
    ];
    let directions = vec![-Vec3::z(), -Vec3::z(), Vec3::zeros(), -Vec3::z()];
    let batch = rt.cast_batch(&origins, &directions).unwrap();
    assert_eq!(batch.hits, vec![true, false, false, true]);
    assert_eq!(batch.face_ids, vec![0, -1, -1, 0]);
    assert_eq!(batch.ws[1], 0.0);
}

#[test]
fn failed_reload_keeps_previous_scene() {
    let rt = sphere(Backend::Scalar, true);
    let mut bad = bvhcast_shape::MeshShape::new();
    bad.add_untessellated_face(None);
    let err = rt.load(&mut bad).unwrap_err();
    assert!(matches!(err, RaytraceError::UntessellatedShape(_)));
    let hit = rt
        .cast_single(Point3::new(0.0, 0.0, 100.0), -Vec3::z(), 0.0, f64::MAX)
        .unwrap();
    assert!(hit.valid);
    assert_eq!(rt.num_faces(), 1);
}

#[test]
fn unsupported_backend_fails_fast() {
    for backend in Backend::ALL {
        let config = RaytracerConfig {
            backend,
            ..Default::default()
        };
        match Raytracer::new(config) {
            Ok(rt) => assert_eq!(rt.backend(), backend),
            Err(e) => {
                assert_eq!(e, RaytraceError::UnsupportedBackend(backend));
                assert!(!available_backends().contains(&backend));
            }
        }
    }
}

#[test]
fn orthographic_box_top_depth() {
    let mut shape = make_box(10.0, 20.0, 30.0).unwrap();
    let rt = Raytracer::with_shape(&mut shape, RaytracerConfig::default()).unwrap();
    let view = bvhcast::OrthoView::new(50, 50, [1.0, 1.0, 9.0, 19.0]);
    let img = rt.render_orthographic(&view).unwrap();
    assert_eq!(img.hit_count(), 2500);
    let (lo, hi) = img.depth_range().unwrap();
    assert!((lo - 30.0).abs() < 1e-4 && (hi - 30.0).abs() < 1e-4);
    assert!(img.face_ids.iter().all(|&id| id == img.face_ids[0]));
}

#[test]
fn cancelled_batch_is_full_length() {
    let rt = sphere(Backend::Scalar, true);
    let (origins, directions) = grid(10);
    let cancel = AtomicBool::new(true);
    let batch = rt.cast_batch_cancellable(&origins, &directions, &cancel).unwrap();
    assert!(batch.cancelled);
    assert_eq!(batch.len(), 100);
    assert_eq!(batch.hit_count(), 0);

    let go = AtomicBool::new(false);
    let batch = rt.cast_batch_cancellable(&origins, &directions, &go).unwrap();
    assert!(!batch.cancelled);
    assert!(batch.hit_count() > 0);
}

#[test]
fn classify_cylinder_points() {
    let mut shape = make_cylinder(5.0, 10.0).unwrap();
    let rt = Raytracer::with_shape(&mut shape, RaytracerConfig::default()).unwrap();
    assert_eq!(rt.classify_point(Point3::new(0.0, 0.0, 5.0)).unwrap(), PointClass::Inside);
    assert_eq!(rt.classify_point(Point3::new(3.0, -2.0, 1.0)).unwrap(), PointClass::Inside);
    assert_eq!(rt.classify_point(Point3::new(0.0, 0.0, 11.0)).unwrap(), PointClass::Outside);
    assert_eq!(rt.classify_point(Point3::new(6.0, 0.0, 5.0)).unwrap(), PointClass::Outside);
}
