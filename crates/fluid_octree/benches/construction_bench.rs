//! Surface-driven octree construction benchmarks.
//!
//! The sloped surface from the construction tests, refined to finer and
//! finer accuracies.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fluid_octree::{Dim2, Dim3, Octree, OctreeConfig};
use glam::{DVec2, DVec3};

fn bench_construct_2d(c: &mut Criterion) {
  let mut group = c.benchmark_group("construct_2d");
  for accuracy in [0.05f64, 0.01, 0.002] {
    let surface = (|p: DVec2| 0.55 + 0.2 * p.x, move |_: DVec2| accuracy);
    group.bench_with_input(BenchmarkId::from_parameter(accuracy), &accuracy, |b, _| {
      b.iter(|| {
        let tree = Octree::<Dim2>::with_config(OctreeConfig::unit(), &surface).unwrap();
        black_box(tree.leaf_count())
      })
    });
  }
  group.finish();
}

fn bench_construct_and_fill_3d(c: &mut Criterion) {
  let mut group = c.benchmark_group("construct_fill_3d");
  group.sample_size(20);
  for accuracy in [0.1f64, 0.03] {
    let surface = (
      |p: DVec3| 0.5 + 0.1 * (p.x * 6.0).sin() * (p.y * 6.0).cos(),
      move |_: DVec3| accuracy,
    );
    group.bench_with_input(BenchmarkId::from_parameter(accuracy), &accuracy, |b, _| {
      b.iter(|| {
        let mut tree = Octree::<Dim3>::with_config(OctreeConfig::unit(), &surface).unwrap();
        tree.fill_water(&surface).unwrap();
        black_box(tree.total_water_volume())
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_construct_2d, bench_construct_and_fill_3d);
criterion_main!(benches);
