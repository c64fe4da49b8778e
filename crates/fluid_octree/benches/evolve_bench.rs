//! Evolve-step benchmarks on uniform closed boxes.
//!
//! Each iteration is one adaptive step of a half-full box that has been run
//! for a few steps so fluxes are non-trivial.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluid_octree::{AdvectionScheme, Dim2, Dim3, Dimension, FluidSolver, Octree, OctreeConfig, SolverConfig};

const WARMUP_STEPS: usize = 10;

fn half_full<D: Dimension>(depth: u32) -> Octree<D> {
  let mut tree = Octree::uniform(OctreeConfig::<D>::unit(), depth).unwrap();
  for id in tree.leaves() {
    let cell = tree.graph_mut().cell_mut(id).unwrap();
    let water = if cell.center()[D::VERTICAL] < 0.5 { 1.0 } else { 0.0 };
    cell.fluid.set_volume_coefficients(water, 1.0).unwrap();
    cell.fluid.velocity.set(D::zero());
  }
  tree
}

fn warmed_solver<D: Dimension>(depth: u32, config: SolverConfig) -> FluidSolver<D> {
  let mut solver = FluidSolver::new(config).unwrap();
  solver.define_water(half_full::<D>(depth), 0.0, 0.0, 1e-4).unwrap();
  for _ in 0..WARMUP_STEPS {
    solver.evolve().unwrap();
  }
  solver
}

/// Step cost against leaf count in 2D.
fn bench_evolve_2d(c: &mut Criterion) {
  let mut group = c.benchmark_group("evolve_2d");
  for depth in [4u32, 5, 6] {
    let mut solver = warmed_solver::<Dim2>(depth, SolverConfig::DEFAULT);
    group.throughput(Throughput::Elements(1u64 << (2 * depth)));
    group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
      b.iter(|| {
        solver.evolve().unwrap();
        black_box(solver.step_count())
      })
    });
  }
  group.finish();
}

/// Step cost in 3D.
fn bench_evolve_3d(c: &mut Criterion) {
  let mut group = c.benchmark_group("evolve_3d");
  group.sample_size(20);
  for depth in [3u32, 4] {
    let mut solver = warmed_solver::<Dim3>(depth, SolverConfig::DEFAULT);
    group.throughput(Throughput::Elements(1u64 << (3 * depth)));
    group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
      b.iter(|| {
        solver.evolve().unwrap();
        black_box(solver.step_count())
      })
    });
  }
  group.finish();
}

/// Face reconstruction schemes on the same box.
fn bench_schemes(c: &mut Criterion) {
  let mut group = c.benchmark_group("evolve_schemes");
  for scheme in [AdvectionScheme::Upwind, AdvectionScheme::HyperC, AdvectionScheme::Hric] {
    let config = SolverConfig {
      advection: scheme,
      ..SolverConfig::DEFAULT
    };
    let mut solver = warmed_solver::<Dim2>(5, config);
    group.bench_function(scheme.name(), |b| {
      b.iter(|| {
        solver.evolve().unwrap();
        black_box(solver.last_courant())
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_evolve_2d, bench_evolve_3d, bench_schemes);
criterion_main!(benches);
