use bvhcast::{available_backends, load, Raytracer, RaytracerConfig};
use bvhcast_math::{Point3, Vec3};
use bvhcast_shape::make_sphere;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn grid(n: usize) -> (Vec<Point3>, Vec<Vec3>) {
    let mut origins = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = -60.0 + 120.0 * i as f64 / (n - 1) as f64;
            let y = -60.0 + 120.0 * j as f64 / (n - 1) as f64;
            origins.push(Point3::new(x, y, 100.0));
        }
    }
    (origins, vec![-Vec3::z(); n * n])
}

fn bench_build(c: &mut Criterion) {
    let mut sphere = make_sphere(50.0).unwrap();
    c.bench_function("load_sphere_0.01", |b| {
        b.iter(|| load(black_box(&mut sphere), 0.001, 0.01).unwrap())
    });
}

fn bench_batch(c: &mut Criterion) {
    let mut sphere = make_sphere(50.0).unwrap();
    let (origins, directions) = grid(256);
    let mut group = c.benchmark_group("cast_batch_65536");
    for backend in available_backends() {
        for parallel in [false, true] {
            let config = RaytracerConfig {
                backend,
                parallel,
                ..Default::default()
            };
            let rt = Raytracer::with_shape(&mut sphere, config).unwrap();
            let id = BenchmarkId::new(backend.name(), if parallel { "parallel" } else { "serial" });
            group.bench_function(id, |b| {
                b.iter(|| rt.cast_batch(black_box(&origins), black_box(&directions)).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_single(c: &mut Criterion) {
    let mut sphere = make_sphere(50.0).unwrap();
    let rt = Raytracer::with_shape(&mut sphere, RaytracerConfig::default()).unwrap();
    c.bench_function("cast_single", |b| {
        b.iter(|| {
            rt.cast_single(
                black_box(Point3::new(3.0, -7.0, 100.0)),
                -Vec3::z(),
                0.0,
                f64::MAX,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_build, bench_batch, bench_single);
criterion_main!(benches);
