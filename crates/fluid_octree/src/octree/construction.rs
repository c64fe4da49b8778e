//! Initial adaptive refinement around a free surface.
//!
//! Each cell is compared against the range of surface heights over its
//! horizontal footprint:
//!
//! ```text
//!            ┌─────┐
//!            │     │   Above      → removed (pure void)
//!   ─ ─ ─ ─ ─└─────┘─ ─ ─ ─ max height
//!     ┌─────┐   ~~~~~~~~~~~    Intersecting → refined until size <= accuracy
//!     │~~~~~│ ~~               (or the depth cap)
//!   ─ └─────┘─ ─ ─ ─ ─ ─ ─ min height
//!   ┌─────┐
//!   │     │                    Below      → kept whole
//!   └─────┘
//! ```

use super::cell::{CellId, SpatialCell};
use super::config::OctreeConfig;
use super::dimension::Dimension;
use super::graph::CellGraph;
use crate::error::{SimError, SimResult};

/// Surface geometry driving construction and initial water.
pub trait SurfaceModel<D: Dimension> {
  /// Height of the free surface above the horizontal part of `position`
  /// (the vertical component is ignored).
  fn surface_height(&self, position: D::Vector) -> f64;

  /// Largest acceptable cell size near `position`.
  fn accuracy(&self, position: D::Vector) -> f64;
}

impl<D, H, A> SurfaceModel<D> for (H, A)
where
  D: Dimension,
  H: Fn(D::Vector) -> f64,
  A: Fn(D::Vector) -> f64,
{
  #[inline]
  fn surface_height(&self, position: D::Vector) -> f64 {
    (self.0)(position)
  }

  #[inline]
  fn accuracy(&self, position: D::Vector) -> f64 {
    (self.1)(position)
  }
}

/// Where a cell sits relative to the surface band over its footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRelation {
  /// Entirely above the highest surface point.
  Above,
  /// Entirely below the lowest surface point.
  Below,
  /// The surface passes through the cell.
  Intersecting,
}

/// What the caller should do with a cell after [`refine_subtree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
  /// Keep the cell (refined or not).
  Keep,
  /// Delete the cell.
  Remove,
}

/// Statistics from construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConstructionStats {
  /// Number of refine operations performed.
  pub cells_refined: usize,
  /// Number of cells deleted as pure void.
  pub cells_removed: usize,
  /// Deepest level reached.
  pub deepest_level: u32,
  /// Number of cells that stopped at the depth cap while still coarser than
  /// the requested accuracy.
  pub capped: usize,
}

/// Sample points across the horizontal footprint of a box.
///
/// `samples` points per horizontal axis, spread from edge to edge; the
/// vertical component is left at `corner`'s.
pub fn footprint_points<D: Dimension>(corner: D::Vector, size: f64, samples: usize) -> Vec<D::Vector> {
  let horizontal = D::D - 1;
  let samples = samples.max(2);
  let count = samples.pow(horizontal as u32);
  let step = size / (samples - 1) as f64;
  (0..count)
    .map(|mut n| {
      let mut p = corner;
      for axis in 0..horizontal {
        p[axis] += step * (n % samples) as f64;
        n /= samples;
      }
      p
    })
    .collect()
}

/// Minimum and maximum surface height over a footprint.
pub fn surface_range<D: Dimension, S: SurfaceModel<D> + ?Sized>(
  surface: &S,
  corner: D::Vector,
  size: f64,
  samples: usize,
) -> SimResult<(f64, f64)> {
  let mut lo = f64::INFINITY;
  let mut hi = f64::NEG_INFINITY;
  for p in footprint_points::<D>(corner, size, samples) {
    let h = surface.surface_height(p);
    if h.is_nan() {
      return Err(SimError::domain("surface_range", "surface height is NaN"));
    }
    lo = lo.min(h);
    hi = hi.max(h);
  }
  Ok((lo, hi))
}

/// Classify a cell against the surface band over its footprint.
pub fn classify<D: Dimension, S: SurfaceModel<D> + ?Sized>(
  cell: &SpatialCell<D>,
  surface: &S,
  samples: usize,
) -> SimResult<SurfaceRelation> {
  let (lo, hi) = surface_range::<D, S>(surface, cell.corner(), cell.size(), samples)?;
  let bottom = cell.corner()[D::VERTICAL];
  let top = bottom + cell.size();
  Ok(if bottom >= hi {
    SurfaceRelation::Above
  } else if top <= lo {
    SurfaceRelation::Below
  } else {
    SurfaceRelation::Intersecting
  })
}

/// Refine `cell` until every intersecting descendant meets the local
/// accuracy, deleting children that lie above the surface.
///
/// Returns the verdict for `cell` itself; the caller removes it on
/// [`Verdict::Remove`].
pub fn refine_subtree<D: Dimension, S: SurfaceModel<D> + ?Sized>(
  graph: &mut CellGraph<D>,
  cell: CellId<D>,
  surface: &S,
  config: &OctreeConfig<D>,
  stats: &mut ConstructionStats,
) -> SimResult<Verdict> {
  let (relation, size, level, center) = {
    let c = graph.cell(cell)?;
    (
      classify(c, surface, config.footprint_samples)?,
      c.size(),
      c.level(),
      c.center(),
    )
  };
  stats.deepest_level = stats.deepest_level.max(level);

  match relation {
    SurfaceRelation::Above => return Ok(Verdict::Remove),
    SurfaceRelation::Below => return Ok(Verdict::Keep),
    SurfaceRelation::Intersecting => {}
  }

  let accuracy = surface.accuracy(center);
  if accuracy.is_nan() {
    return Err(SimError::domain("refine_subtree", "accuracy is NaN"));
  }
  if size <= accuracy {
    return Ok(Verdict::Keep);
  }
  if level >= config.max_level {
    stats.capped += 1;
    return Ok(Verdict::Keep);
  }

  let children = graph.refine(cell)?;
  stats.cells_refined += 1;
  for child in children.into_iter().flatten() {
    if refine_subtree(graph, child, surface, config, stats)? == Verdict::Remove {
      graph.delete_cell(child)?;
      stats.cells_removed += 1;
    }
  }
  Ok(Verdict::Keep)
}

/// Fraction of a cell lying below the surface, by midpoint sampling of the
/// footprint.
pub fn submerged_fraction<D: Dimension, S: SurfaceModel<D> + ?Sized>(
  cell: &SpatialCell<D>,
  surface: &S,
  samples: usize,
) -> SimResult<f64> {
  let samples = samples.max(1);
  let size = cell.size();
  let sub = size / samples as f64;
  // Midpoints: shift the corner by half a sub-cell and sample the interior grid.
  let mut corner = cell.corner();
  for axis in 0..D::D - 1 {
    corner[axis] += 0.5 * sub;
  }
  let points = if samples == 1 {
    vec![corner]
  } else {
    footprint_points::<D>(corner, size - sub, samples)
  };
  let bottom = cell.corner()[D::VERTICAL];
  let mut sum = 0.0;
  for p in &points {
    let h = surface.surface_height(*p);
    if h.is_nan() {
      return Err(SimError::domain("submerged_fraction", "surface height is NaN"));
    }
    sum += ((h - bottom) / size).clamp(0.0, 1.0);
  }
  Ok(sum / points.len() as f64)
}

#[cfg(test)]
#[path = "construction_test.rs"]
mod construction_test;
