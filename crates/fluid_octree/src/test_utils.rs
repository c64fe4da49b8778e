//! Shared fixtures for unit tests.

use glam::DVec2;

use crate::octree::{CellGraph, CellId, Dim2, Octree, OctreeConfig, SpatialCell};

/// Unit squares in a horizontal row, linked along x. Each entry is
/// `(water, total)`; velocities start at zero.
pub(crate) fn row(coefficients: &[(f64, f64)]) -> (CellGraph<Dim2>, Vec<CellId<Dim2>>) {
  let mut graph = CellGraph::new();
  let ids: Vec<_> = coefficients
    .iter()
    .enumerate()
    .map(|(i, &(water, total))| {
      let mut cell = SpatialCell::new(DVec2::new(i as f64, 0.0), 1.0, 0, None);
      cell.fluid.set_volume_coefficients(water, total).unwrap();
      cell.fluid.velocity.set(DVec2::ZERO);
      graph.insert_cell(cell)
    })
    .collect();
  for pair in ids.windows(2) {
    graph.make_neighbors(pair[0], pair[1], 0, 0).unwrap();
  }
  (graph, ids)
}

/// The link from `from` to `to`.
pub(crate) fn link_between(
  graph: &CellGraph<Dim2>,
  from: CellId<Dim2>,
  to: CellId<Dim2>,
) -> crate::octree::LinkId<Dim2> {
  graph
    .cell(from)
    .unwrap()
    .leaf_neighbors()
    .find(|&id| graph.link(id).unwrap().neighbor() == to)
    .unwrap()
}

/// Unit-square domain for uniform trees.
pub(crate) fn unit_square() -> OctreeConfig<Dim2> {
  OctreeConfig::unit()
}

/// Deterministic water pattern in `[0, 1]`: a pool at the bottom plus a
/// blob hanging above it.
pub(crate) fn pool_with_blob(center: DVec2) -> f64 {
  if center.y < 0.4 {
    1.0
  } else if (center - DVec2::new(0.3, 0.75)).length() < 0.15 {
    0.8
  } else {
    0.0
  }
}

/// Uniform closed box of `4^depth` full leaves at rest, water from
/// [`pool_with_blob`].
pub(crate) fn pool_tree(depth: u32) -> Octree<Dim2> {
  let mut tree = Octree::uniform(unit_square(), depth).unwrap();
  for id in tree.leaves() {
    let cell = tree.graph_mut().cell_mut(id).unwrap();
    let water = pool_with_blob(cell.center());
    cell.fluid.set_volume_coefficients(water, 1.0).unwrap();
    cell.fluid.velocity.set(DVec2::ZERO);
  }
  tree
}
