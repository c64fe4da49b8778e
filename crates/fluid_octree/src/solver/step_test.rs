use glam::DVec2;

use super::*;
use crate::octree::{Dim2, Octree, SpatialCell};
use crate::solver::config::AdvectionScheme;
use crate::test_utils::{link_between, pool_tree, row, unit_square};

const TOL: f64 = 1e-12;

fn coefficients(graph: &CellGraph<Dim2>, id: CellId<Dim2>) -> (f64, f64) {
  let fluid = &graph.cell(id).unwrap().fluid;
  (fluid.water(), fluid.total())
}

fn water_volume(graph: &CellGraph<Dim2>) -> f64 {
  graph
    .leaf_ids()
    .into_iter()
    .map(|id| {
      let cell = graph.cell(id).unwrap();
      cell.fluid.water() * cell.volume()
    })
    .sum()
}

/// Links whose both ends are leaves; coarse links never carry flow.
fn leaf_links(tree: &Octree<Dim2>) -> Vec<&crate::octree::NeighborLink<Dim2>> {
  let graph = tree.graph();
  tree
    .leaves()
    .into_iter()
    .flat_map(|id| graph.cell(id).unwrap().leaf_neighbors().collect::<Vec<_>>())
    .map(|id| graph.link(id).unwrap())
    .collect()
}

fn assert_bounded(graph: &CellGraph<Dim2>, step: usize) {
  for id in graph.leaf_ids() {
    let (w, t) = coefficients(graph, id);
    assert!(w >= 0.0 && w <= t && t <= 1.0, "step {step}: ({w}, {t})");
  }
}

// ===== Batch 1: Face velocities =====

/// Water under air, both layers at hydrostatic pressure: no face picks up
/// any velocity and nothing moves.
#[test]
fn test_stratified_pool_stays_at_rest() {
  let mut tree = Octree::uniform(unit_square(), 2).unwrap();
  for id in tree.leaves() {
    let cell = tree.graph_mut().cell_mut(id).unwrap();
    let water = if cell.center().y < 0.5 { 1.0 } else { 0.0 };
    cell.fluid.set_volume_coefficients(water, 1.0).unwrap();
    cell.fluid.velocity.set(DVec2::ZERO);
  }
  let before: Vec<(f64, f64)> = tree.leaves().into_iter().map(|id| coefficients(tree.graph(), id)).collect();

  for _ in 0..10 {
    advance(tree.graph_mut(), &SolverConfig::DEFAULT, 1e-4).unwrap();
  }
  for link in leaf_links(&tree) {
    assert!(link.outflow_velocity().abs() < 1e-8, "face velocity {}", link.outflow_velocity());
  }
  for (id, (w, t)) in tree.leaves().into_iter().zip(before) {
    let (w1, t1) = coefficients(tree.graph(), id);
    assert!((w1 - w).abs() < TOL && (t1 - t).abs() < TOL);
  }
}

/// Bottom pressure of each leaf is the pressure at the top of the one below.
#[test]
fn test_pressure_is_hydrostatic_down_columns() {
  let mut tree = pool_tree(2);
  advance(tree.graph_mut(), &SolverConfig::DEFAULT, 1e-4).unwrap();
  let graph = tree.graph();
  let physics = SolverConfig::DEFAULT.physics;
  let half = |c: &SpatialCell<Dim2>| physics.hydrostatic_increment(c.fluid.density(&physics), 0.5 * c.size());
  for id in graph.leaf_ids() {
    let cell = graph.cell(id).unwrap();
    for link_id in cell.leaf_neighbors() {
      let link = graph.link(link_id).unwrap();
      if link.dim() != 1 || !link.positive_direction() {
        continue;
      }
      let above = graph.cell(link.neighbor()).unwrap();
      let expected = above.fluid.pressure + half(above) + half(cell);
      assert!((cell.fluid.pressure - expected).abs() < 1e-9, "{} vs {expected}", cell.fluid.pressure);
    }
  }
}

/// Faces between two empty cells are reset to rest.
#[test]
fn test_void_faces_reset() {
  let (mut graph, ids) = row(&[(0.0, 0.0), (0.0, 0.0)]);
  let link = link_between(&graph, ids[0], ids[1]);
  graph.links_mut().set_outflow_velocity(link, 3.0).unwrap();

  advance(&mut graph, &SolverConfig::DEFAULT, 0.1).unwrap();
  assert_eq!(graph.link(link).unwrap().outflow_velocity(), 0.0);
  assert_eq!(coefficients(&graph, ids[1]), (0.0, 0.0));
}

// ===== Batch 2: Advection =====

/// Courant number = v·dt·area / donor volume.
#[test]
fn test_courant_reported() {
  let (mut graph, ids) = row(&[(1.0, 1.0), (0.0, 0.5)]);
  let link = link_between(&graph, ids[0], ids[1]);
  graph.links_mut().set_outflow_velocity(link, 0.5).unwrap();

  let report = advance(&mut graph, &SolverConfig::UPWIND, 0.1).unwrap();
  assert!((report.max_courant - 0.05).abs() < TOL);
}

/// Upwind moves donor-fraction fluid across the face.
#[test]
fn test_upwind_transport() {
  let (mut graph, ids) = row(&[(1.0, 1.0), (0.0, 0.5)]);
  let link = link_between(&graph, ids[0], ids[1]);
  graph.links_mut().set_outflow_velocity(link, 0.5).unwrap();

  let report = advance(&mut graph, &SolverConfig::UPWIND, 0.1).unwrap();

  let (w0, t0) = coefficients(&graph, ids[0]);
  let (w1, t1) = coefficients(&graph, ids[1]);
  assert!((w0 - 0.95).abs() < TOL && (t0 - 0.95).abs() < TOL);
  assert!((w1 - 0.05).abs() < TOL && (t1 - 0.55).abs() < TOL);
  assert_eq!(report.updates, [0, 1, 0, 1]);

  let face = graph.link(link).unwrap();
  assert_eq!((face.water(), face.total()), (1.0, 1.0));
  assert!(face.outflow_velocity() > 0.5, "Pressure keeps pushing into the emptier cell");
}

/// Across a sharp interface HYPER-C ships pure water where upwind ships the
/// donor mixture.
#[test]
fn test_hyper_c_compresses_interface() {
  let cells = [(0.0, 1.0), (0.5, 1.0), (0.5, 0.5)];
  let mut moved = Vec::new();
  for scheme in [AdvectionScheme::Upwind, AdvectionScheme::HyperC] {
    let (mut graph, ids) = row(&cells);
    let link = link_between(&graph, ids[1], ids[2]);
    graph.links_mut().set_outflow_velocity(link, 0.5).unwrap();
    let config = SolverConfig {
      advection: scheme,
      ..SolverConfig::DEFAULT
    };
    advance(&mut graph, &config, 0.1).unwrap();
    moved.push(coefficients(&graph, ids[2]).0 - 0.5);
  }
  assert!((moved[0] - 0.025).abs() < TOL, "Upwind: {}", moved[0]);
  assert!((moved[1] - 0.05).abs() < TOL, "HYPER-C: {}", moved[1]);
}

/// Water into a water-full cell is blocked. The face keeps its velocity,
/// slowed only by the overfill pressure of the acceptor.
#[test]
fn test_flux_into_full_cell_blocked() {
  let (mut graph, ids) = row(&[(1.0, 1.0), (1.0, 1.0)]);
  let link = link_between(&graph, ids[0], ids[1]);
  graph.links_mut().set_outflow_velocity(link, 0.5).unwrap();

  let report = advance(&mut graph, &SolverConfig::DEFAULT, 0.1).unwrap();
  assert_eq!(report.limiter.limited_faces, 1);
  assert_eq!(coefficients(&graph, ids[0]), (1.0, 1.0));
  assert_eq!(coefficients(&graph, ids[1]), (1.0, 1.0));
  let velocity = graph.link(link).unwrap().outflow_velocity();
  assert!(velocity > 0.0 && velocity < 0.5, "velocity {velocity}");
}

/// Air pushed into a water-full cell crosses; the acceptor clamps back to
/// full and the donor is left short.
#[test]
fn test_air_into_full_cell_is_absorbed() {
  let (mut graph, ids) = row(&[(0.0, 1.0), (1.0, 1.0)]);
  let link = link_between(&graph, ids[0], ids[1]);
  graph.links_mut().set_outflow_velocity(link, 0.5).unwrap();

  let report = advance(&mut graph, &SolverConfig::DEFAULT, 0.1).unwrap();
  assert_eq!(report.limiter.limited_faces, 0);
  let (w0, t0) = coefficients(&graph, ids[0]);
  assert_eq!(w0, 0.0);
  assert!((t0 - 0.95).abs() < TOL);
  assert_eq!(coefficients(&graph, ids[1]), (1.0, 1.0));
  assert_eq!(report.updates, [0, 0, 1, 1]);
}

// ===== Batch 3: Invariants over many steps =====

/// Water is conserved and every leaf stays within 0 <= water <= total <= 1.
#[test]
fn test_box_conserves_water_and_bounds() {
  let mut tree = pool_tree(3);
  let initial = water_volume(tree.graph());
  let config = SolverConfig::DEFAULT;

  for step in 0..200 {
    advance(tree.graph_mut(), &config, 1e-4).unwrap();
    assert_bounded(tree.graph(), step);
  }
  let drift = (water_volume(tree.graph()) - initial).abs();
  assert!(drift < 1e-9 * initial, "drift {drift}");
  tree.check_topology(config.volume_epsilon).unwrap();
}

/// The hanging blob loses water to the dry cells around it while the total
/// stays put.
#[test]
fn test_blob_sinks_into_surrounding_air() {
  let mut tree = pool_tree(3);
  let initial = water_volume(tree.graph());
  let in_blob = |c: DVec2| (0.125..0.375).contains(&c.x) && (0.625..0.875).contains(&c.y);
  let dry: Vec<_> = tree
    .leaves()
    .into_iter()
    .filter(|&id| tree.cell(id).unwrap().fluid.water() == 0.0)
    .collect();
  let region_water = |tree: &Octree<Dim2>, region: &dyn Fn(DVec2) -> bool| -> f64 {
    tree
      .leaves()
      .into_iter()
      .map(|id| tree.cell(id).unwrap())
      .filter(|c| region(c.center()))
      .map(|c| c.fluid.water() * c.volume())
      .sum()
  };
  let blob_before = region_water(&tree, &in_blob);
  assert!(blob_before > 0.0);

  for step in 0..500 {
    advance(tree.graph_mut(), &SolverConfig::DEFAULT, 1e-4).unwrap();
    assert_bounded(tree.graph(), step);
  }

  let blob_after = region_water(&tree, &in_blob);
  assert!(blob_before - blob_after > 0.01 * blob_before, "blob {blob_before} -> {blob_after}");
  let gained: f64 = dry
    .iter()
    .map(|&id| {
      let cell = tree.cell(id).unwrap();
      cell.fluid.water() * cell.volume()
    })
    .sum();
  assert!(gained > 0.005 * blob_before, "dry cells gained {gained}");

  let drift = (water_volume(tree.graph()) - initial).abs();
  assert!(drift < 1e-9 * initial, "drift {drift}");
}

/// A graded tree built around a sloped surface evolves across level
/// boundaries and keeps its topology.
#[test]
fn test_mixed_level_tree_evolves() {
  let surface = (|p: DVec2| 0.55 + 0.2 * p.x, |p: DVec2| 0.02 + 0.1 * p.x);
  let mut tree = Octree::<Dim2>::new(&surface, 0.0).unwrap();
  tree.fill_water(&surface).unwrap();
  assert!(tree.leaf_count_per_level().iter().filter(|&&n| n > 0).count() > 1);

  let config = SolverConfig::DEFAULT;
  let initial = water_volume(tree.graph());
  let before: Vec<_> = tree
    .leaves()
    .into_iter()
    .map(|id| (id, tree.cell(id).unwrap().fluid.water()))
    .collect();

  for step in 0..50 {
    advance(tree.graph_mut(), &config, 2e-5).unwrap();
    assert_bounded(tree.graph(), step);
  }

  let moved = before
    .iter()
    .map(|&(id, w)| (tree.cell(id).unwrap().fluid.water() - w).abs())
    .fold(0.0, f64::max);
  assert!(moved > 1e-7, "largest change {moved}");
  let drift = (water_volume(tree.graph()) - initial).abs();
  assert!(drift < 1e-9 * initial, "drift {drift}");
  tree.check_topology(config.volume_epsilon).unwrap();
}
