//! Octree - root cell plus the graph of every cell below it.

use super::cell::CellId;
use super::cell::SpatialCell;
use super::config::OctreeConfig;
use super::construction::{refine_subtree, submerged_fraction, ConstructionStats, SurfaceModel, Verdict};
use super::dimension::Dimension;
use super::graph::CellGraph;
use crate::error::{SimError, SimResult};

/// Adaptive tree of cells covering a cubic (square) domain.
pub struct Octree<D: Dimension> {
  graph: CellGraph<D>,
  root: CellId<D>,
  config: OctreeConfig<D>,
  stats: ConstructionStats,
}

impl<D: Dimension> Octree<D> {
  /// Build a unit-sized tree whose bottom sits at height `bottom`, refined
  /// around `surface`.
  pub fn new<S: SurfaceModel<D> + ?Sized>(surface: &S, bottom: f64) -> SimResult<Self> {
    let mut config = OctreeConfig::<D>::default();
    config.origin[D::VERTICAL] = bottom;
    Self::with_config(config, surface)
  }

  /// Build a tree for an explicit domain and depth cap.
  #[tracing::instrument(skip_all, name = "octree::construct")]
  pub fn with_config<S: SurfaceModel<D> + ?Sized>(config: OctreeConfig<D>, surface: &S) -> SimResult<Self> {
    config.validate()?;
    let mut tree = Self::bare(config);
    let mut stats = ConstructionStats::default();
    // The root always stays, even when the whole domain is dry.
    let _: Verdict = refine_subtree(&mut tree.graph, tree.root, surface, &config, &mut stats)?;
    tree.stats = stats;
    tracing::info!(
      leaves = tree.leaf_count(),
      refined = stats.cells_refined,
      removed = stats.cells_removed,
      deepest = stats.deepest_level,
      "octree constructed"
    );
    if stats.capped > 0 {
      tracing::warn!(
        capped = stats.capped,
        max_level = config.max_level,
        "depth cap reached before the requested accuracy"
      );
    }
    Ok(tree)
  }

  /// Regular grid of 2^(depth·D) leaves.
  pub fn uniform(config: OctreeConfig<D>, depth: u32) -> SimResult<Self> {
    config.validate()?;
    if depth > config.max_level {
      return Err(SimError::range(
        "Octree::uniform",
        depth as usize,
        config.max_level as usize + 1,
      ));
    }
    let mut tree = Self::bare(config);
    let mut frontier = vec![tree.root];
    for _ in 0..depth {
      let mut next = Vec::with_capacity(frontier.len() * D::CHILDREN);
      for cell in frontier {
        next.extend(tree.graph.refine(cell)?.into_iter().flatten());
        tree.stats.cells_refined += 1;
      }
      frontier = next;
    }
    tree.stats.deepest_level = depth;
    Ok(tree)
  }

  fn bare(config: OctreeConfig<D>) -> Self {
    let mut graph = CellGraph::new();
    let root = graph.insert_cell(SpatialCell::new(config.origin, config.root_size, 0, None));
    Self {
      graph,
      root,
      config,
      stats: ConstructionStats::default(),
    }
  }

  /// Root cell.
  #[inline]
  pub fn root(&self) -> CellId<D> {
    self.root
  }

  /// Domain and depth configuration.
  #[inline]
  pub fn config(&self) -> &OctreeConfig<D> {
    &self.config
  }

  /// Construction statistics.
  #[inline]
  pub fn stats(&self) -> ConstructionStats {
    self.stats
  }

  /// Cell and link storage.
  #[inline]
  pub fn graph(&self) -> &CellGraph<D> {
    &self.graph
  }

  /// Mutable cell and link storage (refine/coarsen at runtime).
  #[inline]
  pub fn graph_mut(&mut self) -> &mut CellGraph<D> {
    &mut self.graph
  }

  /// Cell lookup.
  #[inline]
  pub fn cell(&self, id: CellId<D>) -> SimResult<&SpatialCell<D>> {
    self.graph.cell(id)
  }

  /// Leaves in depth-first order, child slot order within a parent.
  pub fn leaves(&self) -> Vec<CellId<D>> {
    let mut out = Vec::new();
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let Ok(cell) = self.graph.cell(id) else {
        continue;
      };
      match cell.children() {
        None => out.push(id),
        Some(children) => stack.extend(children.iter().rev().flatten().copied()),
      }
    }
    out
  }

  /// Number of leaves.
  pub fn leaf_count(&self) -> usize {
    self.leaves().len()
  }

  /// Leaves per level, indexed by level.
  pub fn leaf_count_per_level(&self) -> Vec<usize> {
    let mut counts = Vec::new();
    for id in self.leaves() {
      if let Ok(cell) = self.graph.cell(id) {
        let level = cell.level() as usize;
        if counts.len() <= level {
          counts.resize(level + 1, 0);
        }
        counts[level] += 1;
      }
    }
    counts
  }

  /// Initial volume-of-fluid state: every leaf is full (total = 1) and its
  /// water coefficient is the fraction lying below `surface`.
  pub fn fill_water<S: SurfaceModel<D> + ?Sized>(&mut self, surface: &S) -> SimResult<()> {
    let samples = self.config.footprint_samples;
    for id in self.leaves() {
      let cell = self.graph.cell_mut(id)?;
      let water = submerged_fraction(cell, surface, samples)?;
      cell.fluid.set_volume_coefficients(water, 1.0)?;
      cell.fluid.velocity.set(D::zero());
    }
    Ok(())
  }

  /// Sum of water volume over all leaves.
  pub fn total_water_volume(&self) -> f64 {
    self.sum_over_leaves(|cell| cell.fluid.water())
  }

  /// Sum of water plus air volume over all leaves.
  pub fn total_fluid_volume(&self) -> f64 {
    self.sum_over_leaves(|cell| cell.fluid.total())
  }

  fn sum_over_leaves(&self, coefficient: impl Fn(&SpatialCell<D>) -> f64) -> f64 {
    self
      .leaves()
      .into_iter()
      .filter_map(|id| self.graph.cell(id).ok())
      .map(|cell| coefficient(cell) * cell.volume())
      .sum()
  }

  /// Verify the structural invariants of the whole tree.
  pub fn check_topology(&self, volume_epsilon: f64) -> SimResult<()> {
    self.graph.check_topology(volume_epsilon)
  }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
